//! Metrics recording and lifecycle events.
//!
//! The core only records: per-component latency statistics and error
//! counters, exposed as the two series `component_latency_seconds{component}`
//! and `component_errors_total{component}`. Serving them over HTTP is an
//! external collaborator's job; [`MetricsRecorder::exposition`] renders the
//! text form at that boundary.

mod events;

pub use events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Aggregated latency observations for one component.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    /// Number of observations.
    pub count: u64,
    /// Sum of observed durations.
    pub total: Duration,
    /// Smallest observation.
    pub min: Duration,
    /// Largest observation.
    pub max: Duration,
}

impl LatencyStats {
    fn observe(&mut self, elapsed: Duration) {
        if self.count == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.count += 1;
        self.total += elapsed;
    }

    /// Mean observed duration.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.count).unwrap_or(u32::MAX)
        }
    }
}

/// Records per-component latency and error counts.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    latencies: DashMap<String, LatencyStats>,
    errors: DashMap<String, u64>,
}

impl MetricsRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a latency timer for the given component. Observed on
    /// [`ProcessTimer::observe`].
    #[must_use]
    pub fn start_timer(&self, component: &str) -> ProcessTimer<'_> {
        ProcessTimer {
            recorder: self,
            component: component.to_string(),
            start: Instant::now(),
        }
    }

    /// Records one latency observation.
    pub fn record_latency(&self, component: &str, elapsed: Duration) {
        self.latencies
            .entry(component.to_string())
            .or_default()
            .observe(elapsed);
    }

    /// Increments the error counter for the given component.
    pub fn record_error(&self, component: &str) {
        *self.errors.entry(component.to_string()).or_insert(0) += 1;
    }

    /// Returns the latency statistics for a component, if any were recorded.
    #[must_use]
    pub fn latency(&self, component: &str) -> Option<LatencyStats> {
        self.latencies.get(component).map(|s| *s)
    }

    /// Returns the error count for a component.
    #[must_use]
    pub fn error_count(&self, component: &str) -> u64 {
        self.errors.get(component).map_or(0, |c| *c)
    }

    /// Renders the recorded series in Prometheus text exposition format.
    ///
    /// Output is sorted by component name so repeated scrapes are stable.
    #[must_use]
    pub fn exposition(&self) -> String {
        let mut out = String::new();

        let mut latencies: Vec<(String, LatencyStats)> = self
            .latencies
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        latencies.sort_by(|a, b| a.0.cmp(&b.0));

        if !latencies.is_empty() {
            out.push_str("# TYPE component_latency_seconds summary\n");
            for (component, stats) in &latencies {
                out.push_str(&format!(
                    "component_latency_seconds_count{{component=\"{component}\"}} {}\n",
                    stats.count
                ));
                out.push_str(&format!(
                    "component_latency_seconds_sum{{component=\"{component}\"}} {}\n",
                    stats.total.as_secs_f64()
                ));
            }
        }

        let mut errors: Vec<(String, u64)> = self
            .errors
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        errors.sort_by(|a, b| a.0.cmp(&b.0));

        if !errors.is_empty() {
            out.push_str("# TYPE component_errors_total counter\n");
            for (component, count) in &errors {
                out.push_str(&format!(
                    "component_errors_total{{component=\"{component}\"}} {count}\n"
                ));
            }
        }

        out
    }
}

/// Guard measuring the duration of one `process` invocation.
#[derive(Debug)]
pub struct ProcessTimer<'a> {
    recorder: &'a MetricsRecorder,
    component: String,
    start: Instant,
}

impl ProcessTimer<'_> {
    /// Stops the timer and records the observation.
    pub fn observe(self) {
        self.recorder
            .record_latency(&self.component, self.start.elapsed());
    }
}
