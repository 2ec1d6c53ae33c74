// alerting/defaults.rs - Baseline rules for a cognitive runtime

use std::time::Duration;

use super::{AlertRule, AlertSeverity, Comparator, MetricKind};

/// Metric names the baseline rules watch
pub mod names {
    pub const ERRORS: &str = "cognitive.errors";
    pub const QUEUE_DEPTH: &str = "cognitive.queue_depth";
    pub const STEP_LATENCY_MS: &str = "cognitive.step_latency_ms";
    pub const MEMORY_UTILIZATION: &str = "cognitive.memory_utilization";
    pub const ACTIVE_AGENTS: &str = "cognitive.active_agents";
}

impl AlertRule {
    /// Error counter above `max_errors` (ERROR)
    pub fn error_burst(max_errors: f64) -> Self {
        Self::new(
            "cognitive_error_burst",
            "Error burst",
            names::ERRORS,
            MetricKind::Counter,
            Comparator::Gt,
            max_errors,
        )
        .with_description("Runtime errors accumulated beyond the tolerated count")
        .with_severity(AlertSeverity::Error)
    }

    /// Work queue deeper than `max_depth` (WARNING)
    pub fn queue_backlog(max_depth: f64) -> Self {
        Self::new(
            "cognitive_queue_backlog",
            "Queue backlog",
            names::QUEUE_DEPTH,
            MetricKind::Gauge,
            Comparator::Gte,
            max_depth,
        )
        .with_description("Pending work items are piling up")
        .with_cooldown(Duration::from_secs(30))
    }

    /// p95 step latency above `max_ms` (WARNING)
    pub fn slow_steps(max_ms: f64) -> Self {
        Self::percentile(
            "cognitive_slow_steps",
            "Slow reasoning steps",
            names::STEP_LATENCY_MS,
            95.0,
            Comparator::Gt,
            max_ms,
        )
        .with_description("95th percentile step latency is too high")
    }

    /// Memory utilization ratio at or above `ratio` (CRITICAL)
    pub fn memory_pressure(ratio: f64) -> Self {
        Self::new(
            "cognitive_memory_pressure",
            "Memory pressure",
            names::MEMORY_UTILIZATION,
            MetricKind::Gauge,
            Comparator::Gte,
            ratio,
        )
        .with_description("Working memory is close to its capacity")
        .with_severity(AlertSeverity::Critical)
        .with_cooldown(Duration::from_secs(120))
    }

    /// No agent running (INFO)
    pub fn runtime_idle() -> Self {
        Self::new(
            "cognitive_runtime_idle",
            "Runtime idle",
            names::ACTIVE_AGENTS,
            MetricKind::Gauge,
            Comparator::Eq,
            0.0,
        )
        .with_description("No agents are currently active")
        .with_severity(AlertSeverity::Info)
        .with_cooldown(Duration::from_secs(300))
    }
}

/// The baseline rule set installed by `load_default_rules`
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::error_burst(10.0),
        AlertRule::queue_backlog(100.0),
        AlertRule::slow_steps(2000.0),
        AlertRule::memory_pressure(0.9),
        AlertRule::runtime_idle(),
    ]
}
