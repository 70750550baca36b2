//! Observability metrics for the reconciliation domain.
//!
//! Prometheus-compatible metrics exposed via the `metrics` crate facade.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `tally_task_transitions_total` | Counter | `from`, `to` | Task status transitions |
//! | `tally_task_duration_seconds` | Histogram | `status` | Reconciliation run duration |
//! | `tally_dispatch_queue_depth` | Gauge | - | Tasks waiting for a worker |
//! | `tally_quality_runs_total` | Counter | `outcome` | Quality aggregator run outcomes |
//!
//! To export to Prometheus, install a recorder at startup:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Total task status transitions.
    pub const TASK_TRANSITIONS_TOTAL: &str = "tally_task_transitions_total";
    /// Histogram: Reconciliation run duration in seconds.
    pub const TASK_DURATION_SECONDS: &str = "tally_task_duration_seconds";
    /// Gauge: Tasks waiting in the dispatch queue.
    pub const DISPATCH_QUEUE_DEPTH: &str = "tally_dispatch_queue_depth";
    /// Counter: Quality aggregator run outcomes.
    pub const QUALITY_RUNS_TOTAL: &str = "tally_quality_runs_total";
}

/// Records a task status transition.
pub fn record_task_transition(from: &'static str, to: &'static str) {
    counter!(names::TASK_TRANSITIONS_TOTAL, "from" => from, "to" => to).increment(1);
}

/// Records the duration of one reconciliation run.
pub fn observe_task_duration(status: &'static str, seconds: f64) {
    histogram!(names::TASK_DURATION_SECONDS, "status" => status).record(seconds);
}

/// Updates the dispatch queue depth gauge.
pub fn set_queue_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!(names::DISPATCH_QUEUE_DEPTH).set(depth as f64);
}

/// Records one quality aggregator run outcome.
pub fn record_quality_run(outcome: &'static str) {
    counter!(names::QUALITY_RUNS_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        // The metrics facade drops samples when no recorder is installed;
        // these must not panic.
        record_task_transition("pending", "in_progress");
        observe_task_duration("completed", 1.25);
        set_queue_depth(3);
        record_quality_run("written");
    }
}
