// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (Order, OrderItem, OrderStatus, OrderNumber)
// - Events (OrderPlaced, OrderPaid, etc.)
// - Commands (PlaceOrder, TransitionStatus, CancelOrder)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate with the state machine)
// - Ledger (OrderLedger, orchestrates quoting, persistence and enrollment)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod ledger;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use ledger::*;
