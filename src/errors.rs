//! Error types for the flowforge framework.
//!
//! Runtime failures carry structured metadata (originating component, error
//! kind, severity, recoverability) so that handlers and circuit breakers can
//! make policy decisions without parsing messages.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Categorizes the origin of a pipeline error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Data or structure failed validation.
    Validation,
    /// A component failed while processing.
    Runtime,
    /// Invalid or missing configuration.
    Configuration,
    /// A resource (file, memory, handle) was unavailable.
    Resource,
    /// A network operation failed.
    Network,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "VALIDATION",
            Self::Runtime => "RUNTIME",
            Self::Configuration => "CONFIGURATION",
            Self::Resource => "RESOURCE",
            Self::Network => "NETWORK",
        };
        f.write_str(s)
    }
}

/// Severity level of an error, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    /// Informational only.
    Info,
    /// Something looks wrong but execution can proceed.
    Warning,
    /// The operation failed.
    Error,
    /// The pipeline cannot continue.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A structured error raised by or about a component.
///
/// Carries enough metadata for the error handler to choose an action
/// (continue, retry, skip, abort) and preserves the original cause.
#[derive(Debug, Clone, Error)]
#[error("[{component}] {kind}: {message}")]
pub struct ComponentError {
    /// Human-readable message.
    pub message: String,
    /// Name of the component the error originated from.
    pub component: String,
    /// Error category.
    pub kind: ErrorKind,
    /// Severity level.
    pub severity: Severity,
    /// Whether the error handler may attempt recovery.
    pub recoverable: bool,
    /// Additional context key-value pairs.
    pub context: HashMap<String, serde_json::Value>,
    /// The underlying cause, if any.
    #[source]
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ComponentError {
    /// Creates a new component error.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        component: impl Into<String>,
        kind: ErrorKind,
        severity: Severity,
        recoverable: bool,
    ) -> Self {
        Self {
            message: message.into(),
            component: component.into(),
            kind,
            severity,
            recoverable,
            context: HashMap::new(),
            cause: None,
        }
    }

    /// Creates a non-recoverable validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(message, component, ErrorKind::Validation, Severity::Error, false)
    }

    /// Creates a recoverable runtime error.
    #[must_use]
    pub fn runtime(message: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(message, component, ErrorKind::Runtime, Severity::Error, true)
    }

    /// Creates a non-recoverable configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(message, component, ErrorKind::Configuration, Severity::Error, false)
    }

    /// Creates a recoverable resource error.
    #[must_use]
    pub fn resource(message: impl Into<String>, component: impl Into<String>) -> Self {
        Self::new(message, component, ErrorKind::Resource, Severity::Error, true)
    }

    /// Overrides the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attaches the underlying cause. The cause message is mirrored into the
    /// context map so serialized diagnostics retain it.
    #[must_use]
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.context.insert(
            "cause".to_string(),
            serde_json::Value::String(err.to_string()),
        );
        self.cause = Some(Arc::new(err));
        self
    }
}

/// The top-level error type for pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    /// The pipeline accumulated errors during construction.
    #[error("pipeline has {count} construction error(s): {first}")]
    Construction {
        /// Number of construction errors recorded.
        count: usize,
        /// The first recorded error message.
        first: String,
    },

    /// Validation rejected the pipeline before execution.
    #[error("pipeline validation failed: {0}")]
    Validation(String),

    /// A component failed during execution.
    #[error("{0}")]
    Component(#[from] ComponentError),

    /// The run was cancelled.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),

    /// The run exceeded the configured timeout.
    #[error("pipeline timed out after {0:?}")]
    Timeout(Duration),

    /// An internal channel closed before delivering a value.
    #[error("channel closed before '{component}.{port}' received a value")]
    ChannelClosed {
        /// The receiving component.
        component: String,
        /// The receiving port.
        port: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Thread-safe, append-only log of component errors.
///
/// Workers in the concurrent engine push into the collector while the run is
/// in flight; callers query it after the run for the full failure picture.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: RwLock<Vec<ComponentError>>,
}

impl ErrorCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an error.
    pub fn collect(&self, err: ComponentError) {
        self.errors.write().push(err);
    }

    /// Returns all collected errors.
    #[must_use]
    pub fn errors(&self) -> Vec<ComponentError> {
        self.errors.read().clone()
    }

    /// Returns errors originating from the given component.
    #[must_use]
    pub fn by_component(&self, component: &str) -> Vec<ComponentError> {
        self.errors
            .read()
            .iter()
            .filter(|e| e.component == component)
            .cloned()
            .collect()
    }

    /// Returns errors of the given severity.
    #[must_use]
    pub fn by_severity(&self, severity: Severity) -> Vec<ComponentError> {
        self.errors
            .read()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    /// Returns the number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.read().is_empty()
    }

    /// Removes all collected errors.
    pub fn clear(&self) {
        self.errors.write().clear();
    }
}
