use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::{CourseId, OrderId, OrderItemId, UserId};

// ============================================================================
// Order Value Objects
// ============================================================================

/// Human-readable order number, unique across all orders
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// `{prefix}-{YYYYMMDD}-{8 uppercase hex}`
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self(format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNumber {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// The order state machine: PENDING -> PAID | CANCELLED, PAID -> REFUNDED.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A frozen (course, price) pair captured when the order is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub course_id: CourseId,
    pub title: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub course_id: CourseId,
    pub price: Decimal,
}

/// A fully populated order: the row plus all of its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub total_amount: Decimal,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }

    pub fn course_ids(&self) -> impl Iterator<Item = CourseId> + '_ {
        self.items.iter().map(|item| item.course_id)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
