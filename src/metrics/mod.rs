use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order creation and status transitions
// - Enrollment provisioning (created vs. already present)
// - Payment artifact rendering (remote vs. local fallback)
// - Access decisions
// - Renderer circuit breaker state
//
// All metrics are registered with one Prometheus registry owned here.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_created: IntCounter,
    pub order_transitions: IntCounterVec,
    pub order_number_collisions: IntCounter,
    pub operation_duration: HistogramVec,

    // Enrollment Metrics
    pub enrollments: IntCounterVec,

    // Payment Metrics
    pub payment_artifacts: IntCounterVec,
    pub payment_reference_failures: IntCounter,
    pub circuit_breaker_state: IntGauge,

    // Access Metrics
    pub access_decisions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions"),
            &["from_status", "to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let order_number_collisions = IntCounter::new(
            "order_number_collisions_total",
            "Generated order numbers rejected by the uniqueness constraint",
        )?;
        registry.register(Box::new(order_number_collisions.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new("commerce_operation_duration_seconds", "Core operation duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        // Enrollment Metrics
        let enrollments = IntCounterVec::new(
            Opts::new("enrollments_total", "Enrollment provisioning outcomes"),
            &["outcome"],
        )?;
        registry.register(Box::new(enrollments.clone()))?;

        // Payment Metrics
        let payment_artifacts = IntCounterVec::new(
            Opts::new("payment_artifacts_total", "Payment artifacts rendered by source"),
            &["source"],
        )?;
        registry.register(Box::new(payment_artifacts.clone()))?;

        let payment_reference_failures = IntCounter::new(
            "payment_reference_failures_total",
            "Orders created without a payment reference",
        )?;
        registry.register(Box::new(payment_reference_failures.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "payment_renderer_circuit_state",
            "Renderer circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        // Access Metrics
        let access_decisions = IntCounterVec::new(
            Opts::new("access_decisions_total", "Content access decisions by outcome"),
            &["decision"],
        )?;
        registry.register(Box::new(access_decisions.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_transitions,
            order_number_collisions,
            operation_duration,
            enrollments,
            payment_artifacts,
            payment_reference_failures,
            circuit_breaker_state,
            access_decisions,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a status transition
    pub fn record_transition(&self, from: &str, to: &str) {
        self.order_transitions.with_label_values(&[from, to]).inc();
    }

    /// Helper to time a core operation
    pub fn observe_duration(&self, operation: &str, duration_secs: f64) {
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();
        assert!(metrics.registry.gather().len() > 0);
    }

    #[test]
    fn test_record_transition() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("PENDING", "PAID");
        metrics.record_transition("PENDING", "PAID");
        metrics.record_transition("PAID", "REFUNDED");

        let gathered = metrics.registry.gather();
        let transitions = gathered.iter().find(|m| m.name() == "order_transitions_total").unwrap();
        assert_eq!(transitions.metric.len(), 2); // Two different label pairs
    }

    #[test]
    fn test_enrollment_outcomes() {
        let metrics = Metrics::new().unwrap();
        metrics.enrollments.with_label_values(&["created"]).inc();

        let gathered = metrics.registry.gather();
        let enrollments = gathered.iter().find(|m| m.name() == "enrollments_total").unwrap();
        assert_eq!(enrollments.metric[0].counter.value, Some(1.0));
    }
}
