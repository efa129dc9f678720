use uuid::Uuid;
use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything is written
// 2. Events represent facts that have already happened
// 3. State changes flow through apply_event, never through direct mutation
// 4. The persisted row is a snapshot; the event history can rebuild it
//
// ============================================================================

/// Generic Aggregate trait
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Handle the command that brings a new aggregate into existence
    fn create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Create new aggregate from first event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Number of events applied so far
    fn version(&self) -> i64;

    /// Rebuild an aggregate from its event history
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        let mut events = events.into_iter();
        let first = events
            .next()
            .ok_or_else(|| anyhow::anyhow!("No events to load"))?;

        let mut aggregate = Self::apply_first_event(&first.event_data)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;

        for envelope in events {
            aggregate.apply_event(&envelope.event_data)
                .map_err(|e| anyhow::anyhow!("Failed to apply event {}: {}", envelope.sequence_number, e))?;
        }

        Ok(aggregate)
    }
}
