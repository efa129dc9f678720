use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::core::DomainEvent;
use crate::models::{OrderId, UserId};
use super::value_objects::{OrderItem, OrderNumber, OrderStatus};

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Placed(OrderPlaced),
    Paid(OrderPaid),
    Cancelled(OrderCancelled),
    Refunded(OrderRefunded),
}

impl OrderEvent {
    /// Status the order is in after this event
    pub fn resulting_status(&self) -> OrderStatus {
        match self {
            OrderEvent::Placed(_) => OrderStatus::Pending,
            OrderEvent::Paid(_) => OrderStatus::Paid,
            OrderEvent::Cancelled(_) => OrderStatus::Cancelled,
            OrderEvent::Refunded(_) => OrderStatus::Refunded,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::Paid(_) => "OrderPaid",
            OrderEvent::Cancelled(_) => "OrderCancelled",
            OrderEvent::Refunded(_) => "OrderRefunded",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Placed - Initial event, carries the frozen line-items
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub payment_method: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Order Paid - Payment confirmed, enrollments are provisioned with it
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPaid {
    pub paid_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCancelled {
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderRefunded {
    pub refunded_at: DateTime<Utc>,
}
