use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker - guards calls into the broker
// ============================================================================
//
// Counts consecutive failures of a named dependency and short-circuits calls
// while it is considered down. A failed call is never retried here; the
// caller sees the error immediately.
//
// Closed   -> calls pass, failures are counted
// Open     -> calls rejected until `open_for` has elapsed
// HalfOpen -> calls pass, `close_after` successes close it, one failure reopens
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub open_after: u32,
    /// How long an open circuit rejects calls before probing.
    pub open_for: Duration,
    /// Successes needed in half-open to close again.
    pub close_after: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            open_after: 5,
            open_for: Duration::from_secs(30),
            close_after: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("Circuit {0} is open")]
    CircuitOpen(&'static str),

    #[error(transparent)]
    OperationFailed(E),
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Counters>>,
}

struct Counters {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Arc::new(Mutex::new(Counters {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        self.admit().await?;

        match operation.await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure().await;
                Err(CircuitBreakerError::OperationFailed(e))
            }
        }
    }

    async fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.inner.lock().await;
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let cooled_down = inner
            .opened_at
            .is_some_and(|at| at.elapsed() >= self.config.open_for);
        if !cooled_down {
            return Err(CircuitBreakerError::CircuitOpen(self.name));
        }

        tracing::info!(circuit = self.name, "Circuit half-open, probing");
        inner.state = CircuitState::HalfOpen;
        inner.successes = 0;
        Ok(())
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.close_after {
                    tracing::info!(circuit = self.name, "Circuit closed");
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failures += 1;

        let reopen = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.open_after,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if reopen {
            tracing::warn!(
                circuit = self.name,
                failures = inner.failures,
                "Circuit opened"
            );
            inner.state = CircuitState::Open;
            inner.successes = 0;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        tracing::info!(circuit = self.name, "Circuit manually reset");
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
        inner.opened_at = None;
    }
}
