use uuid::Uuid;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::core::Aggregate;
use crate::models::OrderItemId;
use super::value_objects::{LineItem, Order, OrderItem, OrderStatus};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrderAggregate {
    order: Order,
    version: i64,
}

impl OrderAggregate {
    /// Rehydrate from a persisted row and the version recorded next to it
    pub fn from_snapshot(order: Order, version: i64) -> Self {
        Self { order, version }
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn into_order(self) -> Order {
        self.order
    }

    pub fn status(&self) -> OrderStatus {
        self.order.status
    }

    /// Apply a batch of freshly emitted events
    pub fn apply_all(&mut self, events: &[OrderEvent]) -> Result<(), OrderError> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    fn validate_line_items(line_items: &[LineItem]) -> Result<(), OrderError> {
        if line_items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        for item in line_items {
            if item.price.is_sign_negative() {
                return Err(OrderError::InvalidPrice(item.price));
            }
        }

        Ok(())
    }

    fn transition_event(&self, target: OrderStatus) -> Result<OrderEvent, OrderError> {
        let from = self.order.status;
        if !from.can_transition_to(target) {
            return Err(OrderError::InvalidTransition { from, to: target });
        }

        let now = Utc::now();
        match target {
            OrderStatus::Paid => Ok(OrderEvent::Paid(OrderPaid { paid_at: now })),
            OrderStatus::Cancelled => Ok(OrderEvent::Cancelled(OrderCancelled { cancelled_at: now })),
            OrderStatus::Refunded => Ok(OrderEvent::Refunded(OrderRefunded { refunded_at: now })),
            OrderStatus::Pending => Err(OrderError::InvalidTransition { from, to: target }),
        }
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder {
                order_id,
                order_number,
                user_id,
                payment_method,
                line_items,
                placed_at,
            } => {
                Self::validate_line_items(line_items)?;

                let items: Vec<OrderItem> = line_items
                    .iter()
                    .map(|line| OrderItem {
                        id: OrderItemId::new(),
                        order_id: *order_id,
                        course_id: line.course_id,
                        price: line.price,
                    })
                    .collect();
                let total_amount: Decimal = items.iter().map(|item| item.price).sum();

                Ok(vec![OrderEvent::Placed(OrderPlaced {
                    order_id: *order_id,
                    order_number: order_number.clone(),
                    user_id: *user_id,
                    payment_method: payment_method.clone(),
                    items,
                    total_amount,
                    placed_at: *placed_at,
                })])
            }
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Placed(e) => {
                let items_sum: Decimal = e.items.iter().map(|item| item.price).sum();
                if items_sum != e.total_amount {
                    return Err(OrderError::TotalMismatch {
                        total: e.total_amount,
                        items_sum,
                    });
                }

                Ok(Self {
                    order: Order {
                        id: e.order_id,
                        order_number: e.order_number.clone(),
                        total_amount: e.total_amount,
                        payment_method: e.payment_method.clone(),
                        status: OrderStatus::Pending,
                        created_at: e.placed_at,
                        user_id: e.user_id,
                        items: e.items.clone(),
                    },
                    version: 1,
                })
            }
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Placed(_) => return Err(OrderError::UnexpectedCommand),
            OrderEvent::Paid(_) | OrderEvent::Cancelled(_) | OrderEvent::Refunded(_) => {
                let next = event.resulting_status();
                if !self.order.status.can_transition_to(next) {
                    return Err(OrderError::InvalidTransition {
                        from: self.order.status,
                        to: next,
                    });
                }
                self.order.status = next;
            }
        }

        self.version += 1;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder { .. } => Err(OrderError::UnexpectedCommand),

            OrderCommand::TransitionStatus { target } => {
                Ok(vec![self.transition_event(*target)?])
            }

            OrderCommand::CancelOrder => {
                if self.order.status != OrderStatus::Pending {
                    return Err(OrderError::InvalidTransition {
                        from: self.order.status,
                        to: OrderStatus::Cancelled,
                    });
                }
                Ok(vec![self.transition_event(OrderStatus::Cancelled)?])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.order.id.as_uuid()
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::EventEnvelope;
    use crate::domain::order::OrderNumber;
    use crate::models::{CourseId, OrderId, UserId};
    use rust_decimal_macros::dec;

    fn place_command(prices: &[Decimal]) -> OrderCommand {
        OrderCommand::PlaceOrder {
            order_id: OrderId::new(),
            order_number: OrderNumber::from("ORD-20260101-AAAAAAAA".to_string()),
            user_id: UserId::new(),
            payment_method: "QR_CODE".to_string(),
            line_items: prices
                .iter()
                .enumerate()
                .map(|(i, price)| LineItem {
                    course_id: CourseId::new(),
                    title: format!("Course {}", i),
                    price: *price,
                })
                .collect(),
            placed_at: Utc::now(),
        }
    }

    fn placed(prices: &[Decimal]) -> OrderAggregate {
        let events = OrderAggregate::create(&place_command(prices)).unwrap();
        OrderAggregate::apply_first_event(&events[0]).unwrap()
    }

    #[test]
    fn test_place_order_sums_line_items() {
        let aggregate = placed(&[dec!(10), dec!(15)]);

        assert_eq!(aggregate.status(), OrderStatus::Pending);
        assert_eq!(aggregate.order().total_amount, dec!(25));
        assert_eq!(aggregate.order().items.len(), 2);
        assert_eq!(aggregate.version(), 1);
    }

    #[test]
    fn test_place_order_requires_items() {
        let result = OrderAggregate::create(&place_command(&[]));
        assert_eq!(result.unwrap_err(), OrderError::EmptyItems);
    }

    #[test]
    fn test_place_order_rejects_negative_price() {
        let result = OrderAggregate::create(&place_command(&[dec!(-1)]));
        assert!(matches!(result, Err(OrderError::InvalidPrice(_))));
    }

    #[test]
    fn test_pay_then_refund() {
        let mut aggregate = placed(&[dec!(10)]);

        let events = aggregate
            .handle_command(&OrderCommand::TransitionStatus { target: OrderStatus::Paid })
            .unwrap();
        aggregate.apply_all(&events).unwrap();
        assert_eq!(aggregate.status(), OrderStatus::Paid);

        let events = aggregate
            .handle_command(&OrderCommand::TransitionStatus { target: OrderStatus::Refunded })
            .unwrap();
        aggregate.apply_all(&events).unwrap();
        assert_eq!(aggregate.status(), OrderStatus::Refunded);
        assert_eq!(aggregate.version(), 3);
    }

    #[test]
    fn test_repeated_paid_transition_rejected() {
        let mut aggregate = placed(&[dec!(10)]);
        let events = aggregate
            .handle_command(&OrderCommand::TransitionStatus { target: OrderStatus::Paid })
            .unwrap();
        aggregate.apply_all(&events).unwrap();

        let result = aggregate.handle_command(&OrderCommand::TransitionStatus { target: OrderStatus::Paid });
        assert_eq!(
            result.unwrap_err(),
            OrderError::InvalidTransition { from: OrderStatus::Paid, to: OrderStatus::Paid }
        );
        assert_eq!(aggregate.status(), OrderStatus::Paid);
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let aggregate = placed(&[dec!(10)]);
        assert!(aggregate.handle_command(&OrderCommand::CancelOrder).is_ok());

        let mut paid = placed(&[dec!(10)]);
        let events = paid
            .handle_command(&OrderCommand::TransitionStatus { target: OrderStatus::Paid })
            .unwrap();
        paid.apply_all(&events).unwrap();

        assert_eq!(
            paid.handle_command(&OrderCommand::CancelOrder).unwrap_err(),
            OrderError::InvalidTransition { from: OrderStatus::Paid, to: OrderStatus::Cancelled }
        );
    }

    #[test]
    fn test_apply_rejects_illegal_history() {
        let mut aggregate = placed(&[dec!(10)]);
        let refund = OrderEvent::Refunded(OrderRefunded { refunded_at: Utc::now() });

        assert!(aggregate.apply_event(&refund).is_err());
        assert_eq!(aggregate.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_first_event_checks_total() {
        let event = OrderEvent::Placed(OrderPlaced {
            order_id: OrderId::new(),
            order_number: OrderNumber::from("ORD-X".to_string()),
            user_id: UserId::new(),
            payment_method: "QR_CODE".to_string(),
            items: vec![],
            total_amount: dec!(5),
            placed_at: Utc::now(),
        });

        assert!(matches!(
            OrderAggregate::apply_first_event(&event),
            Err(OrderError::TotalMismatch { .. })
        ));
    }

    #[test]
    fn test_load_from_events_replays_history() {
        let events = OrderAggregate::create(&place_command(&[dec!(10), dec!(5)])).unwrap();
        let order_id = match &events[0] {
            OrderEvent::Placed(e) => e.order_id,
            _ => unreachable!(),
        };
        let correlation = Uuid::new_v4();

        let history = vec![
            EventEnvelope::new(order_id.as_uuid(), 1, events[0].clone(), correlation),
            EventEnvelope::new(
                order_id.as_uuid(),
                2,
                OrderEvent::Paid(OrderPaid { paid_at: Utc::now() }),
                correlation,
            ),
        ];

        let aggregate = OrderAggregate::load_from_events(history).unwrap();
        assert_eq!(aggregate.status(), OrderStatus::Paid);
        assert_eq!(aggregate.order().total_amount, dec!(15));
        assert_eq!(aggregate.aggregate_id(), order_id.as_uuid());
    }
}
