//! Circuit breaker for component calls.

use crate::component::{Component, Port, PortValues, ProcessContext};
use crate::errors::{ComponentError, ErrorKind, Severity};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls fail fast until the timeout elapses.
    Open,
    /// Probing: successes close the circuit, any failure reopens it.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// A circuit breaker guarding calls to an unhealthy dependency.
///
/// Closed → Open after `failure_threshold` consecutive failures; Open →
/// HalfOpen on the first call after `timeout` has elapsed since the last
/// failure; HalfOpen → Closed after `success_threshold` consecutive
/// successes, or back to Open on any failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given thresholds and open-state timeout.
    #[must_use]
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Executes the operation under breaker protection.
    ///
    /// In the Open state the call fails fast with a synthetic, recoverable
    /// resource error attributed to the given component.
    pub async fn call<T, F, Fut>(&self, component: &str, op: F) -> Result<T, ComponentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ComponentError>>,
    {
        {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Open {
                let elapsed_since_failure = inner
                    .last_failure
                    .map_or(Duration::MAX, |at| at.elapsed());
                if elapsed_since_failure >= self.timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                } else {
                    return Err(ComponentError::new(
                        "circuit breaker is open",
                        component,
                        ErrorKind::Resource,
                        Severity::Error,
                        true,
                    ));
                }
            }
        }

        let result = op().await;

        let mut inner = self.inner.lock();
        match &result {
            Ok(_) => {
                inner.failure_count = 0;
                if inner.state == CircuitState::HalfOpen {
                    inner.success_count += 1;
                    if inner.success_count >= self.success_threshold {
                        inner.state = CircuitState::Closed;
                    }
                }
            }
            Err(_) => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                if inner.state == CircuitState::HalfOpen
                    || inner.failure_count >= self.failure_threshold
                {
                    inner.state = CircuitState::Open;
                    inner.success_count = 0;
                }
            }
        }

        result
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Clears counters and returns to Closed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
    }
}

/// Wraps a component so every `process` call goes through a circuit breaker.
pub struct GuardedComponent {
    inner: Arc<dyn Component>,
    breaker: Arc<CircuitBreaker>,
    name: String,
}

impl GuardedComponent {
    /// Wraps the component with the given breaker.
    #[must_use]
    pub fn new(inner: Arc<dyn Component>, breaker: Arc<CircuitBreaker>) -> Self {
        let name = inner.name().to_string();
        Self {
            inner,
            breaker,
            name,
        }
    }

    /// Returns the breaker guarding this component.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl Component for GuardedComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn input_ports(&self) -> Vec<Port> {
        self.inner.input_ports()
    }

    fn output_ports(&self) -> Vec<Port> {
        self.inner.output_ports()
    }

    async fn process(
        &self,
        ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError> {
        let inner = self.inner.clone();
        self.breaker
            .call(&self.name, || async move { inner.process(ctx, inputs).await })
            .await
    }

    fn validate(&self) -> Result<(), ComponentError> {
        self.inner.validate()
    }

    async fn initialize(&self, ctx: &ProcessContext) -> Result<(), ComponentError> {
        self.inner.initialize(ctx).await
    }

    async fn health_check(&self, ctx: &ProcessContext) -> Result<(), ComponentError> {
        self.inner.health_check(ctx).await
    }

    async fn cleanup(&self, ctx: &ProcessContext) -> Result<(), ComponentError> {
        self.inner.cleanup(ctx).await
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn version(&self) -> &str {
        self.inner.version()
    }

    fn tags(&self) -> Vec<String> {
        self.inner.tags()
    }
}
