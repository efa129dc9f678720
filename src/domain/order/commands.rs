use chrono::{DateTime, Utc};

use crate::models::{OrderId, UserId};
use super::value_objects::{LineItem, OrderNumber, OrderStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    PlaceOrder {
        order_id: OrderId,
        order_number: OrderNumber,
        user_id: UserId,
        payment_method: String,
        line_items: Vec<LineItem>,
        placed_at: DateTime<Utc>,
    },
    /// Move the order to `target`; only legal state-machine edges succeed
    TransitionStatus {
        target: OrderStatus,
    },
    /// Only a PENDING order can be cancelled
    CancelOrder,
}
