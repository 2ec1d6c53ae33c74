// alerting/mod.rs - Threshold alerting over the metric registry

mod defaults;
mod engine;
mod errors;
mod handler;
mod monitor;
mod rules;

pub use defaults::{default_rules, names};
pub use engine::{AlertEngine, AlertStats, EvaluationSummary, SeverityCounts, DEFAULT_MAX_HISTORY};
pub use errors::{AlertError, AlertResult};
pub use handler::{
    AlertHandler, CallbackAlertHandler, LogAlertHandler, MultiAlertHandler, TriggeredAlert,
};
pub use monitor::spawn_alert_monitor;
pub use rules::{AlertRule, AlertSeverity, Comparator, MetricKind, DEFAULT_COOLDOWN_MS};
