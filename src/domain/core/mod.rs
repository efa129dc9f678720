// ============================================================================
// Domain Core - Generic Abstractions
// ============================================================================
//
// Aggregate and event plumbing shared by every aggregate in src/domain/.
// Nothing here knows about orders or enrollments.
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope};
