//! Per-run execution state.

use crate::observability::MetricsRecorder;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

static NEXT_EXECUTION: AtomicU64 = AtomicU64::new(1);

/// Overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    /// No run has started.
    #[default]
    Idle,
    /// A run is in flight.
    Running,
    /// The run is paused.
    Paused,
    /// The run finished or was stopped.
    Stopped,
    /// The run failed.
    Error,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Execution state of a single component within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentState {
    /// Not yet started.
    #[default]
    Idle,
    /// Currently processing.
    Running,
    /// Paused.
    Paused,
    /// Failed.
    Error,
    /// Finished successfully.
    Completed,
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Error => "ERROR",
            Self::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Runtime context and state for one pipeline.
///
/// The execution id is unique and monotonic within a process: a process-wide
/// sequence number gives ordering, a uuid suffix gives uniqueness across
/// processes.
pub struct ExecutionContext {
    execution_id: String,
    started_at: DateTime<Utc>,
    status: RwLock<PipelineStatus>,
    component_states: RwLock<HashMap<String, ComponentState>>,
    metrics: Arc<MetricsRecorder>,
    tags: RwLock<HashMap<String, String>>,
    variables: RwLock<HashMap<String, serde_json::Value>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Creates a fresh context with a newly allocated execution id.
    #[must_use]
    pub fn new() -> Self {
        let seq = NEXT_EXECUTION.fetch_add(1, Ordering::SeqCst);
        Self {
            execution_id: format!("exec-{seq:06}-{}", Uuid::new_v4().simple()),
            started_at: Utc::now(),
            status: RwLock::new(PipelineStatus::Idle),
            component_states: RwLock::new(HashMap::new()),
            metrics: Arc::new(MetricsRecorder::new()),
            tags: RwLock::new(HashMap::new()),
            variables: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the execution id.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Returns the start timestamp.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        *self.status.read()
    }

    /// Sets the status.
    pub fn set_status(&self, status: PipelineStatus) {
        *self.status.write() = status;
    }

    /// Returns the state of a component, defaulting to Idle.
    #[must_use]
    pub fn component_state(&self, component: &str) -> ComponentState {
        self.component_states
            .read()
            .get(component)
            .copied()
            .unwrap_or_default()
    }

    /// Sets the state of a component.
    pub fn set_component_state(&self, component: &str, state: ComponentState) {
        self.component_states
            .write()
            .insert(component.to_string(), state);
    }

    /// Returns the metrics recorder for this run.
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Sets a tag.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.write().insert(key.into(), value.into());
    }

    /// Returns a tag value.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<String> {
        self.tags.read().get(key).cloned()
    }

    /// Sets a variable.
    pub fn set_variable(&self, key: impl Into<String>, value: serde_json::Value) {
        self.variables.write().insert(key.into(), value);
    }

    /// Returns a variable value.
    #[must_use]
    pub fn variable(&self, key: &str) -> Option<serde_json::Value> {
        self.variables.read().get(key).cloned()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("status", &self.status())
            .field("started_at", &self.started_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_ids_unique_and_monotonic() {
        let a = ExecutionContext::new();
        let b = ExecutionContext::new();

        assert_ne!(a.execution_id(), b.execution_id());

        let seq = |ctx: &ExecutionContext| -> u64 {
            ctx.execution_id()
                .split('-')
                .nth(1)
                .unwrap()
                .parse()
                .unwrap()
        };
        assert!(seq(&a) < seq(&b));
    }

    #[test]
    fn test_status_transitions() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.status(), PipelineStatus::Idle);

        ctx.set_status(PipelineStatus::Running);
        assert_eq!(ctx.status(), PipelineStatus::Running);

        ctx.set_status(PipelineStatus::Stopped);
        assert_eq!(ctx.status(), PipelineStatus::Stopped);
    }

    #[test]
    fn test_component_states_default_idle() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.component_state("x"), ComponentState::Idle);

        ctx.set_component_state("x", ComponentState::Completed);
        assert_eq!(ctx.component_state("x"), ComponentState::Completed);
    }

    #[test]
    fn test_tags_and_variables() {
        let ctx = ExecutionContext::new();
        ctx.set_tag("env", "test");
        ctx.set_variable("count", serde_json::json!(3));

        assert_eq!(ctx.tag("env"), Some("test".to_string()));
        assert_eq!(ctx.variable("count"), Some(serde_json::json!(3)));
        assert_eq!(ctx.tag("missing"), None);
    }
}
