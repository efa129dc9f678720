use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::domain::core::{Aggregate, EventEnvelope};
use crate::domain::enrollment::EnrollmentProvisioner;
use crate::error::{CommerceError, CommerceResult};
use crate::metrics::Metrics;
use crate::models::{CourseId, OrderId, UserId, Viewer};
use crate::payment::{PaymentReference, PaymentReferenceGenerator};
use crate::pricing::PriceQuoter;
use crate::store::{IdentityStore, Store};
use crate::utils::{retry_on_transient, RetryConfig};
use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::events::OrderEvent;
use super::value_objects::{LineItem, Order, OrderNumber, OrderStatus};

// ============================================================================
// Order Ledger
// ============================================================================
//
// Flow for every write:
// 1. Open a unit of work and load (or build) the order aggregate
// 2. Let the aggregate validate the command and emit events
// 3. Write the row, the events and any enrollments in the same unit
// 4. Commit; dropping the unit on any error rolls everything back
//
// ============================================================================

/// Commerce summary for administrators. Revenue counts PAID orders only;
/// refunded and cancelled orders earn nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub paid_orders: u64,
    pub cancelled_orders: u64,
    pub refunded_orders: u64,
    pub total_revenue: Decimal,
    pub total_enrollments: u64,
}

/// Result of checkout. The order exists even when no payment reference
/// could be produced; `payment_retryable` then tells the caller to ask
/// again via `payment_reference`.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub payment: Option<PaymentReference>,
    pub payment_retryable: bool,
}

pub struct OrderLedger {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityStore>,
    quoter: PriceQuoter,
    provisioner: Arc<EnrollmentProvisioner>,
    payments: Arc<PaymentReferenceGenerator>,
    config: LedgerConfig,
    metrics: Arc<Metrics>,
}

impl OrderLedger {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityStore>,
        quoter: PriceQuoter,
        provisioner: Arc<EnrollmentProvisioner>,
        payments: Arc<PaymentReferenceGenerator>,
        config: LedgerConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            identity,
            quoter,
            provisioner,
            payments,
            config,
            metrics,
        }
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    #[tracing::instrument(skip(self, course_ids), fields(courses = course_ids.len()))]
    pub async fn create_order(&self, user_id: UserId, course_ids: &[CourseId]) -> CommerceResult<PlacedOrder> {
        let started = Instant::now();

        self.require_user(user_id).await?;
        let line_items = self.quoter.quote(course_ids).await?;

        let retry = RetryConfig::with_max_attempts(self.config.order_number_attempts);
        let order = retry_on_transient(retry, move |attempt| {
            if attempt > 1 {
                self.metrics.order_number_collisions.inc();
            }
            self.place(user_id, line_items.clone())
        })
        .await
        .into_result()?;

        self.metrics.orders_created.inc();
        self.metrics
            .observe_duration("create_order", started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total_amount,
            "Order placed"
        );

        let (payment, payment_retryable) = match self.payments.reference(order.total_amount, &order.order_number).await {
            Ok(reference) => (Some(reference), false),
            Err(e) => {
                self.metrics.payment_reference_failures.inc();
                tracing::warn!(
                    order_id = %order.id,
                    error = %e,
                    "Payment reference unavailable, order kept"
                );
                (None, true)
            }
        };

        Ok(PlacedOrder {
            order,
            payment,
            payment_retryable,
        })
    }

    async fn require_user(&self, user_id: UserId) -> CommerceResult<()> {
        let timeout = self.config.identity_timeout();
        let user = tokio::time::timeout(timeout, self.identity.get_user(user_id))
            .await
            .map_err(|_| CommerceError::dependency("identity", format!("no answer within {:?}", timeout)))?
            .map_err(|e| CommerceError::dependency("identity", e.to_string()))?;

        match user {
            Some(_) => Ok(()),
            None => Err(CommerceError::UserNotFound(user_id)),
        }
    }

    /// One attempt at persisting a new order under a fresh order number
    async fn place(&self, user_id: UserId, line_items: Vec<LineItem>) -> CommerceResult<Order> {
        let now = Utc::now();
        let command = OrderCommand::PlaceOrder {
            order_id: OrderId::new(),
            order_number: OrderNumber::generate(&self.config.order_number_prefix, now),
            user_id,
            payment_method: self.config.payment_method.clone(),
            line_items,
            placed_at: now,
        };

        let events = OrderAggregate::create(&command)?;
        let first = events
            .first()
            .ok_or_else(|| CommerceError::CorruptHistory("placing an order emitted no events".into()))?;
        let mut aggregate = OrderAggregate::apply_first_event(first)?;
        aggregate.apply_all(&events[1..])?;

        let envelopes = envelopes(aggregate.order().id, 0, events, Some(user_id));

        let mut uow = self.store.begin().await?;
        uow.insert_order(aggregate.order(), aggregate.version()).await?;
        uow.append_order_events(&envelopes).await?;
        uow.commit().await?;

        Ok(aggregate.into_order())
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    pub async fn transition_status(&self, order_id: OrderId, target: OrderStatus) -> CommerceResult<Order> {
        self.execute(order_id, OrderCommand::TransitionStatus { target }).await
    }

    /// Admin confirmation of a manual payment
    pub async fn confirm_payment(&self, order_id: OrderId) -> CommerceResult<Order> {
        self.transition_status(order_id, OrderStatus::Paid).await
    }

    pub async fn cancel(&self, order_id: OrderId) -> CommerceResult<Order> {
        self.execute(order_id, OrderCommand::CancelOrder).await
    }

    pub async fn refund(&self, order_id: OrderId) -> CommerceResult<Order> {
        self.transition_status(order_id, OrderStatus::Refunded).await
    }

    async fn execute(&self, order_id: OrderId, command: OrderCommand) -> CommerceResult<Order> {
        let started = Instant::now();

        match self.execute_in_unit(order_id, &command).await {
            Ok((from, order)) => {
                self.metrics.record_transition(from.as_str(), order.status.as_str());
                self.metrics
                    .observe_duration("transition_status", started.elapsed().as_secs_f64());
                tracing::info!(
                    order_id = %order_id,
                    from = from.as_str(),
                    to = order.status.as_str(),
                    "Order status changed"
                );
                Ok(order)
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    command = ?command,
                    error = %e,
                    "Order transition rolled back"
                );
                Err(e)
            }
        }
    }

    async fn execute_in_unit(
        &self,
        order_id: OrderId,
        command: &OrderCommand,
    ) -> CommerceResult<(OrderStatus, Order)> {
        let mut uow = self.store.begin().await?;

        let record = uow
            .load_order_for_update(order_id)
            .await?
            .ok_or(CommerceError::OrderNotFound(order_id))?;
        let loaded_version = record.version;

        let mut aggregate = OrderAggregate::from_snapshot(record.order, loaded_version);
        let from = aggregate.status();
        let events = aggregate.handle_command(command)?;
        aggregate.apply_all(&events)?;
        let to = aggregate.status();

        uow.update_order_status(order_id, from, to, aggregate.version()).await?;
        uow.append_order_events(&envelopes(order_id, loaded_version, events, None))
            .await?;

        let mut provisioned = Vec::new();
        if to == OrderStatus::Paid {
            let student_id = aggregate.order().user_id;
            let course_ids: Vec<CourseId> = aggregate.order().course_ids().collect();
            for course_id in course_ids {
                provisioned.push(
                    self.provisioner
                        .ensure_enrolled_in(uow.as_mut(), student_id, course_id)
                        .await?,
                );
            }
        }

        uow.commit().await?;
        for outcome in &provisioned {
            self.provisioner.record_committed(outcome);
        }

        Ok((from, aggregate.into_order()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_order(&self, order_id: OrderId) -> CommerceResult<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    /// Only the buyer and administrators may look at an order
    pub async fn order_for_viewer(&self, viewer: &Viewer, order_id: OrderId) -> CommerceResult<Order> {
        let order = self.get_order(order_id).await?;

        if viewer.is_admin() || viewer.user_id == Some(order.user_id) {
            Ok(order)
        } else {
            Err(CommerceError::PermissionDenied(format!(
                "order {} belongs to another user",
                order_id
            )))
        }
    }

    pub async fn orders_for_user(&self, user_id: UserId) -> CommerceResult<Vec<Order>> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    pub async fn orders_by_status(&self, status: OrderStatus) -> CommerceResult<Vec<Order>> {
        Ok(self.store.orders_by_status(status).await?)
    }

    pub async fn all_orders(&self) -> CommerceResult<Vec<Order>> {
        Ok(self.store.all_orders().await?)
    }

    pub async fn order_events(&self, order_id: OrderId) -> CommerceResult<Vec<EventEnvelope<OrderEvent>>> {
        Ok(self.store.order_events(order_id).await?)
    }

    pub async fn statistics(&self) -> CommerceResult<OrderStatistics> {
        let orders = self.store.all_orders().await?;

        let mut stats = OrderStatistics {
            total_orders: orders.len() as u64,
            pending_orders: 0,
            paid_orders: 0,
            cancelled_orders: 0,
            refunded_orders: 0,
            total_revenue: Decimal::ZERO,
            total_enrollments: self.provisioner.total_enrollments().await?,
        };

        for order in &orders {
            match order.status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Paid => {
                    stats.paid_orders += 1;
                    stats.total_revenue += order.total_amount;
                }
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
                OrderStatus::Refunded => stats.refunded_orders += 1,
            }
        }

        tracing::debug!(
            total_orders = stats.total_orders,
            revenue = %stats.total_revenue,
            "Order statistics computed"
        );
        Ok(stats)
    }

    /// Rebuild the order purely from its event history
    pub async fn replay(&self, order_id: OrderId) -> CommerceResult<OrderAggregate> {
        let events = self.store.order_events(order_id).await?;
        if events.is_empty() {
            return Err(CommerceError::OrderNotFound(order_id));
        }

        OrderAggregate::load_from_events(events)
            .map_err(|e| CommerceError::CorruptHistory(format!("order {}: {}", order_id, e)))
    }

    /// Produce the payment reference again, e.g. after it failed at checkout
    pub async fn payment_reference(&self, order_id: OrderId) -> CommerceResult<PaymentReference> {
        let order = self.get_order(order_id).await?;

        self.payments
            .reference(order.total_amount, &order.order_number)
            .await
            .map_err(|e| {
                self.metrics.payment_reference_failures.inc();
                CommerceError::dependency("payment_renderer", e.to_string())
            })
    }
}

/// Wrap freshly emitted events, numbering them after `last_sequence`
fn envelopes(
    order_id: OrderId,
    last_sequence: i64,
    events: Vec<OrderEvent>,
    user_id: Option<UserId>,
) -> Vec<EventEnvelope<OrderEvent>> {
    let correlation_id = Uuid::new_v4();

    events
        .into_iter()
        .enumerate()
        .map(|(i, event)| {
            let envelope = EventEnvelope::new(
                order_id.as_uuid(),
                last_sequence + 1 + i as i64,
                event,
                correlation_id,
            );
            match user_id {
                Some(user_id) => envelope.with_user(user_id.as_uuid()),
                None => envelope,
            }
        })
        .collect()
}
