use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

// ============================================================================
// Event Envelope
// ============================================================================
//
// Wraps a domain event with the metadata recorded next to it in the
// append-only history table.
//
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    /// Groups the events written by one operation
    pub correlation_id: Uuid,

    /// Who triggered this event, when known
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: E::event_version(),
            event_data,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events recorded in history implement this trait.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Name of this particular event variant, stored alongside the payload
    fn event_type(&self) -> &'static str;

    fn event_version() -> i32 where Self: Sized { 1 }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct TestEvent {
        data: String,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str { "TestEvent" }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            aggregate_id,
            1,
            TestEvent { data: "test".to_string() },
            correlation_id,
        );

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert!(envelope.user_id.is_none());
    }

    #[test]
    fn test_envelope_with_user() {
        let user = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            3,
            TestEvent { data: "x".to_string() },
            Uuid::new_v4(),
        )
        .with_user(user);

        assert_eq!(envelope.user_id, Some(user));
        assert_eq!(envelope.sequence_number, 3);
    }
}
