use rust_decimal::Decimal;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Order total {total} does not match line-item sum {items_sum}")]
    TotalMismatch { total: Decimal, items_sum: Decimal },

    #[error("Invalid line-item price: {0}")]
    InvalidPrice(Decimal),

    #[error("Command not valid for this aggregate state")]
    UnexpectedCommand,

    #[error("Aggregate not initialized")]
    NotInitialized,
}
