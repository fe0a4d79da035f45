//! The process-call boundary shared by both engines.
//!
//! Every `process` invocation is timed, its failures are collected and fed
//! to the error handler, and retries authorised by the handler are executed
//! with the pipeline's backoff schedule. Retry sleeps are cancellable.

use crate::component::{Component, PortValues, ProcessContext};
use crate::errors::{ComponentError, ErrorCollector, Severity};
use crate::observability::MetricsRecorder;
use crate::resilience::{ErrorAction, ErrorHandler, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// How an invocation concluded.
#[derive(Debug)]
pub(crate) enum InvokeOutcome {
    /// The component produced outputs (possibly after retries).
    Completed(PortValues),
    /// The handler chose Continue or Skip; downstream sees no outputs from
    /// this component.
    Skipped,
    /// The run was cancelled during a retry wait.
    Cancelled,
    /// The component failed terminally.
    Failed(ComponentError),
}

/// Runs `process` under the shared policy boundary.
pub(crate) async fn invoke_component(
    component: &Arc<dyn Component>,
    ctx: &ProcessContext,
    inputs: &PortValues,
    policy: &RetryPolicy,
    handler: &Arc<dyn ErrorHandler>,
    metrics: &MetricsRecorder,
    collector: &ErrorCollector,
) -> InvokeOutcome {
    let name = component.name().to_string();
    let mut attempt: u32 = 0;

    loop {
        ctx.events()
            .try_emit("component.started", Some(json!({ "component": name })));

        // The process future is dropped if the run is cancelled mid-call, so
        // even a component that never returns cannot outlive the run.
        let timer = metrics.start_timer(&name);
        let result = tokio::select! {
            result = component.process(ctx, inputs.clone()) => result,
            () = ctx.cancel_token().cancelled() => {
                timer.observe();
                return InvokeOutcome::Cancelled;
            }
        };
        timer.observe();

        match result {
            Ok(outputs) => {
                ctx.events()
                    .try_emit("component.completed", Some(json!({ "component": name })));
                return InvokeOutcome::Completed(outputs);
            }
            Err(err) => {
                metrics.record_error(&name);
                collector.collect(err.clone());
                ctx.events().try_emit(
                    "component.failed",
                    Some(json!({ "component": name, "error": err.to_string() })),
                );

                match handler.handle(&err) {
                    ErrorAction::Retry if policy.is_retryable(err.kind) => {
                        let delay = policy.delay_for(attempt);
                        attempt += 1;
                        debug!(
                            component = %name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "retrying component after error"
                        );
                        tokio::select! {
                            () = ctx.cancel_token().cancelled() => return InvokeOutcome::Cancelled,
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                    // The handler authorised a retry but the policy excludes
                    // this kind; treat as terminal.
                    ErrorAction::Retry => return InvokeOutcome::Failed(err),
                    ErrorAction::Continue => {
                        if err.severity >= Severity::Error {
                            warn!(component = %name, error = %err, "continuing past component error");
                        }
                        return InvokeOutcome::Skipped;
                    }
                    ErrorAction::Skip => {
                        debug!(component = %name, error = %err, "skipping component");
                        return InvokeOutcome::Skipped;
                    }
                    ErrorAction::Abort => return InvokeOutcome::Failed(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Port, PortType};
    use crate::errors::ErrorKind;
    use crate::resilience::DefaultErrorHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with a recoverable runtime error until the given number of
    /// calls, then succeeds.
    #[derive(Debug)]
    struct Flaky {
        name: String,
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl Flaky {
        fn new(succeed_on: u32) -> Self {
            Self {
                name: "flaky".to_string(),
                calls: AtomicU32::new(0),
                succeed_on,
            }
        }
    }

    #[async_trait]
    impl Component for Flaky {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_name(&mut self, name: &str) {
            self.name = name.to_string();
        }

        fn input_ports(&self) -> Vec<Port> {
            Vec::new()
        }

        fn output_ports(&self) -> Vec<Port> {
            vec![Port::output("out", PortType::Integer)]
        }

        async fn process(
            &self,
            _ctx: &ProcessContext,
            _inputs: PortValues,
        ) -> Result<PortValues, ComponentError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                Err(ComponentError::runtime("transient failure", &self.name))
            } else {
                Ok(PortValues::from([("out".to_string(), json!(call))]))
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::default().with_initial_delay(Duration::from_millis(1))
    }

    async fn run_invoke(component: Arc<dyn Component>, max_retries: u32) -> InvokeOutcome {
        let ctx = ProcessContext::detached();
        let handler: Arc<dyn ErrorHandler> = Arc::new(DefaultErrorHandler::new(max_retries));
        let metrics = MetricsRecorder::new();
        let collector = ErrorCollector::new();
        invoke_component(
            &component,
            &ctx,
            &PortValues::new(),
            &policy().with_max_retries(max_retries),
            &handler,
            &metrics,
            &collector,
        )
        .await
    }

    #[tokio::test]
    async fn test_succeeds_within_retry_budget() {
        let outcome = run_invoke(Arc::new(Flaky::new(4)), 3).await;
        match outcome {
            InvokeOutcome::Completed(outputs) => assert_eq!(outputs["out"], json!(4)),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fails_when_budget_exhausted() {
        let outcome = run_invoke(Arc::new(Flaky::new(4)), 2).await;
        match outcome {
            InvokeOutcome::Failed(err) => assert_eq!(err.kind, ErrorKind::Runtime),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_kind_fails_immediately() {
        #[derive(Debug)]
        struct AlwaysConfigError(String);

        #[async_trait]
        impl Component for AlwaysConfigError {
            fn name(&self) -> &str {
                &self.0
            }
            fn set_name(&mut self, name: &str) {
                self.0 = name.to_string();
            }
            fn input_ports(&self) -> Vec<Port> {
                Vec::new()
            }
            fn output_ports(&self) -> Vec<Port> {
                Vec::new()
            }
            async fn process(
                &self,
                _ctx: &ProcessContext,
                _inputs: PortValues,
            ) -> Result<PortValues, ComponentError> {
                // Recoverable, so the handler says Retry, but the kind is not
                // in the retryable set.
                Err(ComponentError::new(
                    "bad config",
                    &self.0,
                    ErrorKind::Configuration,
                    Severity::Error,
                    true,
                ))
            }
        }

        let outcome = run_invoke(Arc::new(AlwaysConfigError("cfg".to_string())), 3).await;
        assert!(matches!(outcome, InvokeOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_metrics_and_collector_record_each_attempt() {
        let component: Arc<dyn Component> = Arc::new(Flaky::new(3));
        let ctx = ProcessContext::detached();
        let handler: Arc<dyn ErrorHandler> = Arc::new(DefaultErrorHandler::new(3));
        let metrics = MetricsRecorder::new();
        let collector = ErrorCollector::new();

        let outcome = invoke_component(
            &component,
            &ctx,
            &PortValues::new(),
            &policy(),
            &handler,
            &metrics,
            &collector,
        )
        .await;

        assert!(matches!(outcome, InvokeOutcome::Completed(_)));
        // Two failures then one success: three timed calls, two errors.
        assert_eq!(metrics.latency("flaky").unwrap().count, 3);
        assert_eq!(metrics.error_count("flaky"), 2);
        assert_eq!(collector.count(), 2);
    }
}
