//! Sequential execution engine.
//!
//! Drives the pipeline in a single thread of control: components run once
//! each, in topological order, with inputs gathered from a shared value map
//! keyed by `(component, output port)`.

use super::{invoke_component, Engine, ExternalChannels, InvokeOutcome};
use crate::cancel::CancelToken;
use crate::component::{PortValues, ProcessContext};
use crate::errors::FlowError;
use crate::pipeline::{ComponentState, Pipeline, PipelineStatus};
use crate::validate::PipelineValidator;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// Executes components one at a time in topological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEngine;

impl SequentialEngine {
    /// Creates a sequential engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn run_inner(
        &self,
        pipeline: &Pipeline,
        cancel: &CancelToken,
        external: &mut ExternalChannels,
        order: &[String],
        ctx: &ProcessContext,
    ) -> Result<(), FlowError> {
        let policy = pipeline.config().retry_policy.clone();
        let handler = pipeline.error_handler();
        let metrics = pipeline.context().metrics().clone();
        let collector = pipeline.error_collector().clone();

        // Values published by completed components, keyed by
        // (component, output port).
        let mut values: PortValues = PortValues::new();
        let key = |component: &str, port: &str| format!("{component}.{port}");

        for name in order {
            if cancel.is_cancelled() {
                return Err(FlowError::Cancelled(
                    cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                ));
            }

            let Some(component) = pipeline.component(name) else {
                return Err(FlowError::Internal(format!("component '{name}' not found")));
            };

            let mut inputs = PortValues::new();
            for port in component.input_ports() {
                if let Some(rx) = external.inputs.get_mut(&port.name) {
                    let value = tokio::select! {
                        value = rx.recv() => value,
                        () = cancel.cancelled() => {
                            return Err(FlowError::Cancelled(
                                cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                            ));
                        }
                    };
                    let Some(value) = value else {
                        return Err(FlowError::ChannelClosed {
                            component: name.clone(),
                            port: port.name.clone(),
                        });
                    };
                    inputs.insert(port.name.clone(), value);
                    continue;
                }

                let inbound = pipeline
                    .connections()
                    .iter()
                    .find(|c| c.feeds(name, &port.name));
                if let Some(conn) = inbound {
                    let value = values.get(&key(&conn.from_component, &conn.from_port)).cloned();
                    match value {
                        Some(value) => {
                            let value = match &conn.transform {
                                Some(transform) => transform.apply(value).await?,
                                None => value,
                            };
                            inputs.insert(port.name.clone(), value);
                        }
                        None if port.required => {
                            // The upstream component was skipped and produced
                            // nothing for a port that must be fed.
                            return Err(FlowError::ChannelClosed {
                                component: name.clone(),
                                port: port.name.clone(),
                            });
                        }
                        None => {
                            if let Some(default) = &port.default_value {
                                inputs.insert(port.name.clone(), default.clone());
                            }
                        }
                    }
                } else if let Some(default) = &port.default_value {
                    inputs.insert(port.name.clone(), default.clone());
                }
            }

            debug!(component = %name, "executing component");
            pipeline
                .context()
                .set_component_state(name, ComponentState::Running);

            let outcome = invoke_component(
                &component,
                ctx,
                &inputs,
                &policy,
                &handler,
                &metrics,
                &collector,
            )
            .await;

            match outcome {
                InvokeOutcome::Completed(outputs) => {
                    pipeline
                        .context()
                        .set_component_state(name, ComponentState::Completed);
                    for port in component.output_ports() {
                        let Some(value) = outputs.get(&port.name) else {
                            continue;
                        };
                        values.insert(key(name, &port.name), value.clone());
                        if let Some(tx) = external.outputs.get(&port.name) {
                            let sent = tokio::select! {
                                sent = tx.send(value.clone()) => sent.is_ok(),
                                () = cancel.cancelled() => false,
                            };
                            if !sent && cancel.is_cancelled() {
                                return Err(FlowError::Cancelled(
                                    cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                                ));
                            }
                        }
                    }
                }
                InvokeOutcome::Skipped => {
                    pipeline
                        .context()
                        .set_component_state(name, ComponentState::Completed);
                }
                InvokeOutcome::Cancelled => {
                    return Err(FlowError::Cancelled(
                        cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
                    ));
                }
                InvokeOutcome::Failed(err) => {
                    pipeline
                        .context()
                        .set_component_state(name, ComponentState::Error);
                    return Err(FlowError::Component(err));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Engine for SequentialEngine {
    async fn run(
        &self,
        pipeline: &Pipeline,
        cancel: CancelToken,
        mut external: ExternalChannels,
    ) -> Result<(), FlowError> {
        let validator = PipelineValidator::new();
        let result = validator.validate_with_inputs(pipeline, &external.input_names());
        if !result.valid {
            let message = result
                .first_error()
                .map_or_else(|| "unknown validation failure".to_string(), |e| e.message.clone());
            return Err(FlowError::Validation(message));
        }

        let order = result
            .graph
            .as_ref()
            .and_then(|g| g.topology_order().map(<[String]>::to_vec))
            .ok_or_else(|| {
                FlowError::Validation(
                    "pipeline graph has a cycle; the sequential engine requires a DAG".to_string(),
                )
            })?;

        let events = pipeline.event_sink();
        let ctx = ProcessContext::new(pipeline.context().execution_id(), cancel.clone())
            .with_events(events.clone());

        events.try_emit("pipeline.started", Some(json!({ "pipeline": pipeline.name() })));
        pipeline.context().set_status(PipelineStatus::Running);

        pipeline.initialize_components(&ctx).await?;

        let timeout = pipeline.config().timeout;
        let outcome = tokio::select! {
            outcome = self.run_inner(pipeline, &cancel, &mut external, &order, &ctx) => outcome,
            () = tokio::time::sleep(timeout) => Err(FlowError::Timeout(timeout)),
        };

        // Cleanup runs regardless of how the run ended.
        pipeline.cleanup_components(&ctx).await;

        match &outcome {
            Ok(()) => {
                pipeline.context().set_status(PipelineStatus::Stopped);
                events.try_emit(
                    "pipeline.completed",
                    Some(json!({ "pipeline": pipeline.name() })),
                );
            }
            Err(err) => {
                pipeline.context().set_status(PipelineStatus::Error);
                events.try_emit(
                    "pipeline.failed",
                    Some(json!({ "pipeline": pipeline.name(), "error": err.to_string() })),
                );
            }
        }

        outcome
    }
}
