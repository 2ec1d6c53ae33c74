// alerting/rules.rs - Alert rule definitions and conditions

use cognitive_common::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::errors::{AlertError, AlertResult};
use crate::metrics::{metric_key, percentile, MetricsSnapshot, Tags};

/// Cooldown applied when a rule does not specify one
pub const DEFAULT_COOLDOWN_MS: u64 = 60_000;

/// Severity levels for alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info = 0,
    Warning = 1,
    Error = 2,
    Critical = 3,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "INFO"),
            AlertSeverity::Warning => write!(f, "WARNING"),
            AlertSeverity::Error => write!(f, "ERROR"),
            AlertSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Which registry table a rule reads its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    /// A percentile of a histogram's retained samples
    Percentile,
}

/// Comparison applied as `current_value <op> threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    #[serde(rename = "==", alias = "eq")]
    Eq,
    #[serde(rename = "!=", alias = "ne")]
    Ne,
}

impl Comparator {
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Gte => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Lte => value <= threshold,
            Comparator::Eq => (value - threshold).abs() < f64::EPSILON,
            Comparator::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Threshold rule evaluated against a metrics snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Metric name to watch
    pub metric: String,
    pub metric_type: MetricKind,
    pub operator: Comparator,
    pub threshold: f64,
    /// Required (0..=100) when `metric_type` is `Percentile`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
    #[serde(default = "default_severity")]
    pub severity: AlertSeverity,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only the metric series carrying exactly these tags is watched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

fn default_severity() -> AlertSeverity {
    AlertSeverity::Warning
}
fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}
fn default_enabled() -> bool {
    true
}

impl AlertRule {
    /// Create an enabled warning rule with the default cooldown
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        metric: impl Into<String>,
        metric_type: MetricKind,
        operator: Comparator,
        threshold: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            metric: metric.into(),
            metric_type,
            operator,
            threshold,
            percentile: None,
            severity: default_severity(),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            enabled: true,
            tags: None,
        }
    }

    /// Rule over a percentile of a histogram
    pub fn percentile(
        id: impl Into<String>,
        name: impl Into<String>,
        metric: impl Into<String>,
        p: f64,
        operator: Comparator,
        threshold: f64,
    ) -> Self {
        let mut rule = Self::new(id, name, metric, MetricKind::Percentile, operator, threshold);
        rule.percentile = Some(p);
        rule
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Registry key of the watched series
    pub fn metric_key(&self) -> String {
        metric_key(&self.metric, self.tags.as_ref())
    }

    /// Reject malformed rules before they reach the rule set
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::required("name"));
        }
        if self.metric.trim().is_empty() {
            return Err(ValidationError::required("metric"));
        }
        ValidationError::ensure_finite("threshold", self.threshold)?;

        match (self.metric_type, self.percentile) {
            (MetricKind::Percentile, None) => Err(ValidationError::required("percentile")),
            (MetricKind::Percentile, Some(p)) if !(0.0..=100.0).contains(&p) => {
                Err(ValidationError::out_of_range("percentile", p, 0, 100))
            }
            _ => Ok(()),
        }
    }

    /// Resolve the watched value from a snapshot.
    ///
    /// A missing series (or an empty histogram) is an evaluation error for
    /// this rule only.
    pub fn current_value(&self, snapshot: &MetricsSnapshot) -> AlertResult<f64> {
        let key = self.metric_key();
        let value = match self.metric_type {
            MetricKind::Counter => snapshot.counter(&key),
            MetricKind::Gauge => snapshot.gauge(&key),
            MetricKind::Percentile => {
                let p = self.percentile.unwrap_or(50.0);
                snapshot
                    .histogram(&key)
                    .and_then(|samples| percentile(samples, p))
            }
        };

        value.ok_or_else(|| AlertError::Evaluation {
            rule_id: self.id.clone(),
            reason: format!("no {} value for '{}'", self.kind_label(), key),
        })
    }

    /// Does `value` violate the rule?
    pub fn is_violated_by(&self, value: f64) -> bool {
        self.operator.apply(value, self.threshold)
    }

    /// Human-readable description of a violation
    pub fn describe(&self, value: f64) -> String {
        format!(
            "{}: {} is {} ({} {})",
            self.name,
            self.watched_label(),
            value,
            self.operator,
            self.threshold
        )
    }

    fn kind_label(&self) -> &'static str {
        match self.metric_type {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Percentile => "histogram",
        }
    }

    fn watched_label(&self) -> String {
        match (self.metric_type, self.percentile) {
            (MetricKind::Percentile, Some(p)) => format!("p{} of {}", p, self.metric_key()),
            _ => self.metric_key(),
        }
    }
}
