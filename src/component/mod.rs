//! The component contract: named processing units with typed ports.

mod port;
mod schema;
mod transform;

pub use port::{FlowType, Port, PortType};
pub use schema::{Constraint, NotNull, NumericRange, Pattern, Schema, SchemaViolation, StringLength};
pub use transform::{
    FnTransform, IdentityTransform, StringifyTransform, Transform, UppercaseTransform,
};

use crate::cancel::CancelToken;
use crate::errors::ComponentError;
use crate::observability::{EventSink, NoOpEventSink};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Values keyed by port name, as consumed and produced by `process`.
pub type PortValues = HashMap<String, Value>;

/// Per-invocation context handed to component operations.
///
/// Carries the run's execution id, the cancellation token and the event sink.
/// Long-running components should poll or await the token and return early
/// once it fires.
#[derive(Clone)]
pub struct ProcessContext {
    execution_id: String,
    cancel: CancelToken,
    events: Arc<dyn EventSink>,
}

impl ProcessContext {
    /// Creates a context for the given run.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            execution_id: execution_id.into(),
            cancel,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a standalone context for tests and detached component calls.
    #[must_use]
    pub fn detached() -> Self {
        Self::new("detached", CancelToken::new())
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the execution id of the current run.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Returns the cancellation token for the current run.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns true if the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the event sink.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("execution_id", &self.execution_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A stateful processing unit with typed input and output ports.
///
/// Lifecycle: the component is created externally, attached to a pipeline
/// (which stamps its name), `initialize` runs once before the first
/// `process`, `process` runs zero or more times, and `cleanup` runs once at
/// the end. Metadata and lifecycle methods have default implementations so
/// authors compose a [`ComponentInfo`] rather than inherit a base struct.
#[async_trait]
pub trait Component: Send + Sync {
    /// Returns the component name, stamped at attach time.
    fn name(&self) -> &str;

    /// Sets the component name. Called by the pipeline on attach.
    fn set_name(&mut self, name: &str);

    /// Returns the input ports in declared order.
    fn input_ports(&self) -> Vec<Port>;

    /// Returns the output ports in declared order.
    fn output_ports(&self) -> Vec<Port>;

    /// Processes one set of inputs into outputs.
    async fn process(
        &self,
        ctx: &ProcessContext,
        inputs: PortValues,
    ) -> Result<PortValues, ComponentError>;

    /// Checks internal configuration before execution.
    fn validate(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Prepares the component for execution.
    async fn initialize(&self, _ctx: &ProcessContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Probes component health.
    async fn health_check(&self, _ctx: &ProcessContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Releases resources after execution.
    async fn cleanup(&self, _ctx: &ProcessContext) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Component version.
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Classification tags.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Identity and metadata carrier for component implementations.
///
/// Embed one and delegate `name`/`set_name`/`description`/`version`/`tags`
/// to it.
#[derive(Debug, Clone, Default)]
pub struct ComponentInfo {
    /// Name, stamped at attach time.
    pub name: String,
    /// Description.
    pub description: String,
    /// Version.
    pub version: String,
    /// Tags.
    pub tags: Vec<String>,
}

impl ComponentInfo {
    /// Creates metadata with the given description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            description: description.into(),
            version: "1.0.0".to_string(),
            tags: Vec::new(),
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }
}
