// telemetry.rs - Prometheus self-metrics for the observability layer itself
//
// These count what the alert engine, recorder and replayer do across the whole
// process. Domain metrics live in `MetricRegistry` instances, never here.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Process-wide registry for self-metrics
    pub(crate) static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Alerting
    // ============================================================================

    /// Total number of alerts opened
    pub static ref ALERTS_FIRED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_alerts_fired_total",
        "Total number of alerts opened by rule violations"
    ).expect("Failed to create alerts_fired_total metric");

    /// Total number of alerts closed
    pub static ref ALERTS_RESOLVED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_alerts_resolved_total",
        "Total number of alerts closed"
    ).expect("Failed to create alerts_resolved_total metric");

    /// Total number of evaluation passes
    pub static ref ALERT_EVALUATIONS_TOTAL: IntCounter = IntCounter::new(
        "cognitive_alert_evaluations_total",
        "Total number of alert evaluation passes"
    ).expect("Failed to create alert_evaluations_total metric");

    /// Rules whose metric could not be resolved during a pass
    pub static ref ALERT_EVALUATION_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "cognitive_alert_evaluation_errors_total",
        "Total number of per-rule evaluation errors"
    ).expect("Failed to create alert_evaluation_errors_total metric");

    /// Duration of one evaluation pass
    pub static ref ALERT_EVALUATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cognitive_alert_evaluation_duration_seconds",
            "Duration of alert evaluation passes in seconds"
        )
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5])
    ).expect("Failed to create alert_evaluation_duration metric");

    // ============================================================================
    // Recording and Replay
    // ============================================================================

    /// Total number of events captured into recordings
    pub static ref EVENTS_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_events_recorded_total",
        "Total number of events captured into recordings"
    ).expect("Failed to create events_recorded_total metric");

    /// Events dropped because a recording hit its size cap
    pub static ref EVENTS_DROPPED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_events_dropped_total",
        "Total number of events dropped by truncated recordings"
    ).expect("Failed to create events_dropped_total metric");

    /// Number of recordings held in memory
    pub static ref RECORDINGS_STORED: IntGauge = IntGauge::new(
        "cognitive_recordings_stored",
        "Number of recordings currently held in the catalog"
    ).expect("Failed to create recordings_stored metric");

    /// Total number of events re-emitted by replays
    pub static ref REPLAY_EVENTS_EMITTED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_replay_events_emitted_total",
        "Total number of events re-emitted during replay"
    ).expect("Failed to create replay_events_emitted_total metric");

    /// Events skipped by a replay's before-event hook
    pub static ref REPLAY_EVENTS_SKIPPED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_replay_events_skipped_total",
        "Total number of events skipped during replay"
    ).expect("Failed to create replay_events_skipped_total metric");

    /// Total number of aborted replays
    pub static ref REPLAYS_ABORTED_TOTAL: IntCounter = IntCounter::new(
        "cognitive_replays_aborted_total",
        "Total number of replays stopped before completion"
    ).expect("Failed to create replays_aborted_total metric");
}

/// Register all self-metrics with the process-wide registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Alerting
        Box::new(ALERTS_FIRED_TOTAL.clone()),
        Box::new(ALERTS_RESOLVED_TOTAL.clone()),
        Box::new(ALERT_EVALUATIONS_TOTAL.clone()),
        Box::new(ALERT_EVALUATION_ERRORS_TOTAL.clone()),
        Box::new(ALERT_EVALUATION_DURATION.clone()),
        // Recording and replay
        Box::new(EVENTS_RECORDED_TOTAL.clone()),
        Box::new(EVENTS_DROPPED_TOTAL.clone()),
        Box::new(RECORDINGS_STORED.clone()),
        Box::new(REPLAY_EVENTS_EMITTED_TOTAL.clone()),
        Box::new(REPLAY_EVENTS_SKIPPED_TOTAL.clone()),
        Box::new(REPLAYS_ABORTED_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Prometheus text exposition of the self-metrics
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_gather_text_includes_registered_families() {
        register_metrics().unwrap();
        ALERT_EVALUATIONS_TOTAL.inc();

        let text = gather_text().unwrap();

        assert!(text.contains("cognitive_alert_evaluations_total"));
        assert!(text.contains("# TYPE cognitive_recordings_stored gauge"));
    }
}
