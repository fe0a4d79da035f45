//! Execution engines.
//!
//! An engine drives a validated pipeline: it supplies inputs, sequences
//! `process` calls, and collects outputs and errors. Two strategies are
//! provided: a single-threaded [`SequentialEngine`] driven by topological
//! order and a worker-per-component [`ConcurrentEngine`] wired through
//! bounded per-edge queues.

mod concurrent;
mod invoke;
mod queue;
mod sequential;

#[cfg(test)]
mod engine_tests;

pub use concurrent::ConcurrentEngine;
pub use queue::{edge_queue, EdgeReceiver, EdgeSender, RecvError, SendError};
pub use sequential::SequentialEngine;

pub(crate) use invoke::{invoke_component, InvokeOutcome};

use crate::cancel::CancelToken;
use crate::errors::FlowError;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// External channels feeding unconnected input ports and draining
/// unconnected output ports, keyed by port name.
#[derive(Debug, Default)]
pub struct ExternalChannels {
    /// Receivers for externally supplied input values.
    pub inputs: HashMap<String, mpsc::Receiver<Value>>,
    /// Senders for externally consumed output values.
    pub outputs: HashMap<String, mpsc::Sender<Value>>,
}

impl ExternalChannels {
    /// Creates an empty channel set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an external input.
    #[must_use]
    pub fn with_input(mut self, port: impl Into<String>, rx: mpsc::Receiver<Value>) -> Self {
        self.inputs.insert(port.into(), rx);
        self
    }

    /// Registers an external output.
    #[must_use]
    pub fn with_output(mut self, port: impl Into<String>, tx: mpsc::Sender<Value>) -> Self {
        self.outputs.insert(port.into(), tx);
        self
    }

    /// Names of externally supplied input ports.
    #[must_use]
    pub fn input_names(&self) -> HashSet<String> {
        self.inputs.keys().cloned().collect()
    }
}

/// A strategy for executing a pipeline.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Executes the pipeline to completion.
    ///
    /// The cancellation token applies to the whole run; every blocking
    /// operation inside the engine selects on it.
    async fn run(
        &self,
        pipeline: &Pipeline,
        cancel: CancelToken,
        external: ExternalChannels,
    ) -> Result<(), FlowError>;
}
