//! Concurrent execution engine.
//!
//! One worker task per component, wired through bounded per-connection
//! queues. Workers gather one value per input port in declared order, invoke
//! `process` once, and publish outputs in declared port order: to the
//! external channel when the port name is externally consumed, otherwise to
//! every outbound connection's queue. Failures fan into a single error
//! channel; the first one becomes the engine result while the rest stay in
//! the error collector. A watchdog merges caller cancellation and the
//! configured timeout into the run token every blocking operation selects on.

use super::queue::{edge_queue, EdgeReceiver, EdgeSender};
use super::{invoke_component, Engine, ExternalChannels, InvokeOutcome};
use crate::cancel::CancelToken;
use crate::component::{Component, PortValues, ProcessContext, Transform};
use crate::errors::{ComponentError, ErrorKind, FlowError, Severity};
use crate::pipeline::{BackpressureStrategy, ComponentState, DropPolicy, Pipeline, PipelineStatus};
use crate::validate::PipelineValidator;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Executes one worker per component, connected by typed bounded queues.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentEngine;

impl ConcurrentEngine {
    /// Creates a concurrent engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Where one input port of a worker reads its value from.
enum InputSource {
    /// External channel registered under the port name.
    External(mpsc::Receiver<Value>),
    /// The unique inbound connection's queue, with its optional transform.
    Edge(EdgeReceiver, Option<Arc<dyn Transform>>),
    /// The port's declared default value.
    Default(Value),
    /// Optional port with nothing feeding it.
    Absent,
}

/// Where one output port of a worker writes its value to.
enum OutputTarget {
    /// External channel registered under the port name.
    External(mpsc::Sender<Value>),
    /// One queue per outbound connection (fan-out writes one value each).
    Edges(Vec<EdgeSender>),
}

struct WorkerPlan {
    name: String,
    component: Arc<dyn Component>,
    inputs: Vec<(String, InputSource)>,
    outputs: Vec<(String, OutputTarget)>,
}

#[async_trait]
impl Engine for ConcurrentEngine {
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

        let events = pipeline.event_sink().clone();
        events.try_emit("pipeline.started", Some(json!({ "pipeline": pipeline.name() })));
        pipeline.context().set_status(PipelineStatus::Running);

        // The run token is the only token workers see; the watchdog folds
        // caller cancellation and the configured timeout into it.
        let run_token = CancelToken::new();
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = {
            let caller = cancel.clone();
            let run_token = run_token.clone();
            let timed_out = timed_out.clone();
            let timeout = pipeline.config().timeout;
            tokio::spawn(async move {
                tokio::select! {
                    () = caller.cancelled() => {
                        run_token.cancel(
                            caller.reason().unwrap_or_else(|| "cancelled".to_string()),
                        );
                    }
                    () = tokio::time::sleep(timeout) => {
                        timed_out.store(true, Ordering::SeqCst);
                        run_token.cancel("run timed out");
                    }
                }
            })
        };

        let ctx = ProcessContext::new(pipeline.context().execution_id(), run_token.clone())
            .with_events(events.clone());

        if let Err(err) = pipeline.initialize_components(&ctx).await {
            watchdog.abort();
            pipeline.context().set_status(PipelineStatus::Error);
            return Err(err);
        }

        // One queue per connection; fan-out from a port means one queue per
        // outbound edge.
        let mut edge_receivers: HashMap<usize, EdgeReceiver> = HashMap::new();
        let mut edge_senders: HashMap<usize, EdgeSender> = HashMap::new();
        for (index, conn) in pipeline.connections().iter().enumerate() {
            let (capacity, strategy, drop_policy) = match &conn.backpressure {
                Some(bp) => match bp.strategy {
                    BackpressureStrategy::Block => {
                        (conn.buffer_size, BackpressureStrategy::Block, bp.drop_policy)
                    }
                    BackpressureStrategy::Drop => {
                        (bp.buffer_size, BackpressureStrategy::Drop, bp.drop_policy)
                    }
                    BackpressureStrategy::Buffer => {
                        (bp.buffer_size, BackpressureStrategy::Buffer, bp.drop_policy)
                    }
                },
                None => (
                    conn.buffer_size,
                    BackpressureStrategy::Block,
                    DropPolicy::DropOldest,
                ),
            };
            let (tx, rx) = edge_queue(conn.name.clone(), capacity, strategy, drop_policy);
            edge_senders.insert(index, tx);
            edge_receivers.insert(index, rx);
        }

        // Build one plan per component, in insertion order.
        let mut plans: Vec<WorkerPlan> = Vec::new();
        for name in pipeline.component_names() {
            let Some(component) = pipeline.component(&name) else {
                continue;
            };

            let mut inputs = Vec::new();
            for port in component.input_ports() {
                let source = if let Some(rx) = external.inputs.remove(&port.name) {
                    InputSource::External(rx)
                } else {
                    let inbound = pipeline
                        .connections()
                        .iter()
                        .position(|c| c.feeds(&name, &port.name));
                    match inbound {
                        Some(index) => {
                            let transform =
                                pipeline.connections()[index].transform.clone();
                            match edge_receivers.remove(&index) {
                                Some(rx) => InputSource::Edge(rx, transform),
                                None => InputSource::Absent,
                            }
                        }
                        None => match &port.default_value {
                            Some(default) => InputSource::Default(default.clone()),
                            None => InputSource::Absent,
                        },
                    }
                };
                inputs.push((port.name.clone(), source));
            }

            let mut outputs = Vec::new();
            for port in component.output_ports() {
                let target = if let Some(tx) = external.outputs.get(&port.name) {
                    OutputTarget::External(tx.clone())
                } else {
                    let senders: Vec<EdgeSender> = pipeline
                        .connections()
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.sourced_from(&name, &port.name))
                        .filter_map(|(index, _)| edge_senders.remove(&index))
                        .collect();
                    OutputTarget::Edges(senders)
                };
                outputs.push((port.name.clone(), target));
            }

            plans.push(WorkerPlan {
                name,
                component,
                inputs,
                outputs,
            });
        }
        drop(external);
        // Unclaimed queue halves (e.g. edges whose source port is drained
        // externally) must close now, or their readers would block forever.
        drop(edge_senders);
        drop(edge_receivers);

        let (err_tx, mut err_rx) = mpsc::channel::<ComponentError>(plans.len().max(1));
        let policy = pipeline.config().retry_policy.clone();
        let handler = pipeline.error_handler();
        let metrics = pipeline.context().metrics().clone();
        let collector = pipeline.error_collector().clone();
        let exec_ctx = pipeline.context().clone();

        let mut workers = Vec::with_capacity(plans.len());
        for plan in plans {
            let ctx = ctx.clone();
            let run_token = run_token.clone();
            let err_tx = err_tx.clone();
            let policy = policy.clone();
            let handler = handler.clone();
            let metrics = metrics.clone();
            let collector = collector.clone();
            let exec_ctx = exec_ctx.clone();

            workers.push(tokio::spawn(async move {
                let WorkerPlan {
                    name,
                    component,
                    inputs: input_plan,
                    outputs: output_plan,
                } = plan;
                exec_ctx.set_component_state(&name, ComponentState::Running);

                // Gather exactly one value per input port, in declared order.
                let mut inputs = PortValues::new();
                for (port, source) in input_plan {
                    match source {
                        InputSource::External(mut rx) => {
                            let value = tokio::select! {
                                value = rx.recv() => value,
                                () = run_token.cancelled() => return,
                            };
                            let Some(value) = value else {
                                let err = channel_closed(&name, &port);
                                collector.collect(err.clone());
                                let _ = err_tx.send(err).await;
                                exec_ctx.set_component_state(&name, ComponentState::Error);
                                return;
                            };
                            inputs.insert(port, value);
                        }
                        InputSource::Edge(mut rx, transform) => {
                            let value = match rx.recv(&run_token).await {
                                Ok(Some(value)) => value,
                                Ok(None) => {
                                    let err = channel_closed(&name, &port);
                                    collector.collect(err.clone());
                                    let _ = err_tx.send(err).await;
                                    exec_ctx.set_component_state(&name, ComponentState::Error);
                                    return;
                                }
                                Err(_) => return,
                            };
                            let value = match transform {
                                Some(transform) => match transform.apply(value).await {
                                    Ok(value) => value,
                                    Err(err) => {
                                        collector.collect(err.clone());
                                        let _ = err_tx.send(err).await;
                                        exec_ctx
                                            .set_component_state(&name, ComponentState::Error);
                                        return;
                                    }
                                },
                                None => value,
                            };
                            inputs.insert(port, value);
                        }
                        InputSource::Default(value) => {
                            inputs.insert(port, value);
                        }
                        InputSource::Absent => {}
                    }
                }

                debug!(component = %name, "worker invoking component");
                let outcome = invoke_component(
                    &component,
                    &ctx,
                    &inputs,
                    &policy,
                    &handler,
                    &metrics,
                    &collector,
                )
                .await;

                let outputs = match outcome {
                    InvokeOutcome::Completed(outputs) => outputs,
                    InvokeOutcome::Skipped => {
                        exec_ctx.set_component_state(&name, ComponentState::Completed);
                        return;
                    }
                    InvokeOutcome::Cancelled => return,
                    InvokeOutcome::Failed(err) => {
                        exec_ctx.set_component_state(&name, ComponentState::Error);
                        let _ = err_tx.send(err).await;
                        return;
                    }
                };

                // Publish in declared port order.
                for (port, target) in output_plan {
                    let Some(value) = outputs.get(&port) else {
                        continue;
                    };
                    match target {
                        OutputTarget::External(tx) => {
                            tokio::select! {
                                _ = tx.send(value.clone()) => {}
                                () = run_token.cancelled() => return,
                            }
                        }
                        OutputTarget::Edges(senders) => {
                            for sender in &senders {
                                if sender.send(value.clone(), &run_token).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }

                exec_ctx.set_component_state(&name, ComponentState::Completed);
            }));
        }
        drop(err_tx);

        // Terminator: waits for every worker, which drops the remaining
        // error-channel senders and closes the fan-in.
        let terminator = tokio::spawn(async move {
            for worker in workers {
                let _ = worker.await;
            }
        });

        let mut first_error: Option<ComponentError> = None;
        while let Some(err) = err_rx.recv().await {
            if first_error.is_none() {
                first_error = Some(err);
            }
        }
        let _ = terminator.await;
        watchdog.abort();

        pipeline.cleanup_components(&ctx).await;

        // Cancellation supersedes component errors; timeout is reported as
        // its own condition.
        let outcome = if cancel.is_cancelled() {
            Err(FlowError::Cancelled(
                cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
            ))
        } else if timed_out.load(Ordering::SeqCst) {
            Err(FlowError::Timeout(pipeline.config().timeout))
        } else if let Some(err) = first_error {
            Err(FlowError::Component(err))
        } else {
            Ok(())
        };

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

fn channel_closed(component: &str, port: &str) -> ComponentError {
    ComponentError::new(
        format!("channel closed before input '{port}' received a value"),
        component,
        ErrorKind::Runtime,
        Severity::Error,
        false,
    )
}
