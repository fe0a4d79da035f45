//! Pipeline configuration and backpressure settings.

use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a full edge queue treats further sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackpressureStrategy {
    /// The sender waits until space is available.
    #[default]
    Block,
    /// A value is discarded according to the drop policy.
    Drop,
    /// Like Block, but with the queue capacity taken from the
    /// backpressure config instead of the connection buffer size.
    Buffer,
}

impl std::fmt::Display for BackpressureStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Block => "BLOCK",
            Self::Drop => "DROP",
            Self::Buffer => "BUFFER",
        };
        f.write_str(s)
    }
}

/// Which value is discarded when a Drop-strategy queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropPolicy {
    /// Discard the value at the front of the queue.
    #[default]
    DropOldest,
    /// Discard the incoming value.
    DropNewest,
    /// Discard a uniformly random queued value.
    DropRandom,
}

impl std::fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DropOldest => "DROP_OLDEST",
            Self::DropNewest => "DROP_NEWEST",
            Self::DropRandom => "DROP_RANDOM",
        };
        f.write_str(s)
    }
}

/// Per-connection backpressure configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackpressureConfig {
    /// Strategy for a full queue.
    pub strategy: BackpressureStrategy,
    /// Queue capacity used by the Drop and Buffer strategies.
    pub buffer_size: usize,
    /// Drop policy, used by the Drop strategy.
    pub drop_policy: DropPolicy,
    /// Send timeout hint.
    pub timeout: Duration,
    /// Retry budget hint for the sender.
    pub max_retries: u32,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            strategy: BackpressureStrategy::Block,
            buffer_size: 100,
            drop_policy: DropPolicy::DropOldest,
            timeout: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

impl BackpressureConfig {
    /// Creates a blocking backpressure config.
    #[must_use]
    pub fn blocking() -> Self {
        Self::default()
    }

    /// Creates a dropping backpressure config with the given capacity and
    /// policy.
    #[must_use]
    pub fn dropping(buffer_size: usize, drop_policy: DropPolicy) -> Self {
        Self {
            strategy: BackpressureStrategy::Drop,
            buffer_size,
            drop_policy,
            ..Self::default()
        }
    }

    /// Creates a buffering backpressure config with the given capacity.
    #[must_use]
    pub fn buffering(buffer_size: usize) -> Self {
        Self {
            strategy: BackpressureStrategy::Buffer,
            buffer_size,
            ..Self::default()
        }
    }
}

/// Execution, resource, and monitoring settings for a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on concurrent workers. Must be positive.
    pub max_concurrency: usize,
    /// Overall run timeout. Must be positive.
    pub timeout: Duration,
    /// Retry policy applied at the process-call boundary.
    pub retry_policy: RetryPolicy,
    /// Soft memory limit in bytes; used only for validator warnings.
    pub memory_limit_bytes: u64,
    /// Soft CPU limit as a fraction of one core; validator warnings only.
    pub cpu_limit_fraction: f64,
    /// Whether metrics recording is enabled.
    pub metrics_enabled: bool,
    /// Whether tracing spans are enabled.
    pub tracing_enabled: bool,
    /// Log level name.
    pub log_level: String,
    /// Whether validation warnings should be treated strictly.
    pub strict_validation: bool,
    /// Whether graph cycles are tolerated (reported as warnings).
    pub allow_cycles: bool,
    /// Default per-connection buffer size. Must be positive.
    pub default_buffer_size: usize,
    /// Maximum per-connection buffer size. Must be at least the default.
    pub max_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            memory_limit_bytes: 1024 * 1024 * 1024,
            cpu_limit_fraction: 1.0,
            metrics_enabled: true,
            tracing_enabled: false,
            log_level: "INFO".to_string(),
            strict_validation: true,
            allow_cycles: false,
            default_buffer_size: 100,
            max_buffer_size: 1000,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the run timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Allows graph cycles (downgrades cycle diagnostics to warnings).
    #[must_use]
    pub fn with_allow_cycles(mut self, allow: bool) -> Self {
        self.allow_cycles = allow;
        self
    }

    /// Sets the default connection buffer size.
    #[must_use]
    pub fn with_default_buffer_size(mut self, size: usize) -> Self {
        self.default_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_satisfy_invariants() {
        let config = PipelineConfig::default();
        assert!(config.max_concurrency > 0);
        assert!(config.timeout > Duration::ZERO);
        assert!(config.default_buffer_size > 0);
        assert!(config.max_buffer_size >= config.default_buffer_size);
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new()
            .with_max_concurrency(4)
            .with_timeout(Duration::from_secs(5))
            .with_allow_cycles(true);

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.allow_cycles);
    }

    #[test]
    fn test_backpressure_constructors() {
        let bp = BackpressureConfig::dropping(8, DropPolicy::DropNewest);
        assert_eq!(bp.strategy, BackpressureStrategy::Drop);
        assert_eq!(bp.buffer_size, 8);
        assert_eq!(bp.drop_policy, DropPolicy::DropNewest);

        let bp = BackpressureConfig::buffering(16);
        assert_eq!(bp.strategy, BackpressureStrategy::Buffer);
        assert_eq!(bp.buffer_size, 16);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(BackpressureStrategy::Block.to_string(), "BLOCK");
        assert_eq!(DropPolicy::DropRandom.to_string(), "DROP_RANDOM");
    }
}
