// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory. `core` holds the aggregate and
// event envelope abstractions shared by them.
//
// ============================================================================

pub mod core;
pub mod order;
pub mod enrollment;
