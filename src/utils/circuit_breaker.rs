use std::sync::Arc;
use tokio::sync::Mutex;
use std::time::{Duration, Instant};

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards calls to an unreliable collaborator. After `failure_threshold`
// consecutive failures the breaker opens and rejects calls without making
// them; once `timeout` has elapsed one trial call is let through.
//
// States:
// - Closed: calls pass through
// - Open: calls rejected immediately
// - HalfOpen: trial calls decide whether to close or reopen
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric form exported as a gauge
    pub fn code(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time spent open before a trial call
    pub timeout: Duration,
    /// Trial successes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    state: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Run `operation` unless the breaker is open
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().await;

            if state.state == CircuitState::Open {
                let cooled_down = state
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.timeout)
                    .unwrap_or(true);

                if !cooled_down {
                    return Err(CircuitBreakerError::CircuitOpen);
                }

                tracing::info!(breaker = self.name, "Circuit breaker half-open, allowing trial call");
                state.state = CircuitState::HalfOpen;
                state.success_count = 0;
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    tracing::info!(breaker = self.name, "Circuit breaker closed");
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.opened_at = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;

        match state.state {
            CircuitState::Closed if state.failure_count >= self.config.failure_threshold => {
                tracing::warn!(
                    breaker = self.name,
                    failures = state.failure_count,
                    "Circuit breaker opened"
                );
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = self.name, "Trial call failed, reopening circuit");
                state.state = CircuitState::Open;
                state.success_count = 0;
                state.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.lock().await.state
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "renderer",
            CircuitBreakerConfig {
                failure_threshold,
                timeout,
                success_threshold: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(1));

        for _ in 0..3 {
            let result = cb.call(async { Err::<(), _>("unreachable") }).await;
            assert!(matches!(result, Err(CircuitBreakerError::OperationFailed(_))));
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        // Rejected without running the operation
        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(2, Duration::from_secs(1));

        let _ = cb.call(async { Err::<(), _>("timeout") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;
        let _ = cb.call(async { Err::<(), _>("timeout") }).await;

        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_circuit() {
        let cb = breaker(2, Duration::from_millis(100));

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("timeout") }).await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failed_trial_reopens() {
        let cb = breaker(1, Duration::from_millis(50));

        let _ = cb.call(async { Err::<(), _>("timeout") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = cb.call(async { Err::<(), _>("still down") }).await;

        assert_eq!(cb.get_state().await, CircuitState::Open);
        assert_eq!(CircuitState::Open.code(), 1);
    }
}
