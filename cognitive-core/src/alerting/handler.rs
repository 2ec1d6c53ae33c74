// alerting/handler.rs - Triggered alerts and the handlers notified about them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AlertRule, AlertSeverity};

/// An alert opened by a rule violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlert {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub metric: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TriggeredAlert {
    /// Open a new alert for `rule` observed at `value`
    pub fn new(rule: &AlertRule, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            metric: rule.metric_key(),
            severity: rule.severity,
            message: rule.describe(value),
            current_value: value,
            threshold: rule.threshold,
            timestamp,
            acknowledged: false,
            resolved_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Copy with the acknowledged flag set
    pub fn acknowledged(&self) -> Self {
        Self {
            acknowledged: true,
            ..self.clone()
        }
    }

    /// Copy closed at `at`
    pub fn resolved(&self, at: DateTime<Utc>) -> Self {
        Self {
            resolved_at: Some(at),
            ..self.clone()
        }
    }
}

/// Trait for handling alert lifecycle notifications.
///
/// Called after the engine has released its state, so a handler may call
/// back into the engine.
pub trait AlertHandler: Send + Sync {
    /// An alert was opened
    fn on_alert(&self, alert: &TriggeredAlert);

    /// An alert was closed
    fn on_resolve(&self, _alert: &TriggeredAlert) {}
}

/// Alert handler that writes to the tracing log
#[derive(Debug, Clone, Default)]
pub struct LogAlertHandler;

impl LogAlertHandler {
    pub fn new() -> Self {
        Self
    }
}

impl AlertHandler for LogAlertHandler {
    fn on_alert(&self, alert: &TriggeredAlert) {
        match alert.severity {
            AlertSeverity::Info => {
                tracing::info!(
                    rule = %alert.rule_id,
                    metric = %alert.metric,
                    value = alert.current_value,
                    message = %alert.message,
                    "[ALERT:INFO]"
                );
            }
            AlertSeverity::Warning => {
                tracing::warn!(
                    rule = %alert.rule_id,
                    metric = %alert.metric,
                    value = alert.current_value,
                    message = %alert.message,
                    "[ALERT:WARNING]"
                );
            }
            AlertSeverity::Error => {
                tracing::error!(
                    rule = %alert.rule_id,
                    metric = %alert.metric,
                    value = alert.current_value,
                    message = %alert.message,
                    "[ALERT:ERROR]"
                );
            }
            AlertSeverity::Critical => {
                tracing::error!(
                    rule = %alert.rule_id,
                    metric = %alert.metric,
                    value = alert.current_value,
                    message = %alert.message,
                    "[ALERT:CRITICAL]"
                );
            }
        }
    }

    fn on_resolve(&self, alert: &TriggeredAlert) {
        tracing::info!(
            rule = %alert.rule_id,
            metric = %alert.metric,
            severity = %alert.severity,
            "[ALERT:RESOLVED] {}",
            alert.rule_name
        );
    }
}

/// Composite handler that fans notifications out to multiple handlers
#[derive(Default)]
pub struct MultiAlertHandler {
    handlers: Vec<Box<dyn AlertHandler>>,
}

impl MultiAlertHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain
    pub fn add_handler<H: AlertHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl AlertHandler for MultiAlertHandler {
    fn on_alert(&self, alert: &TriggeredAlert) {
        for handler in &self.handlers {
            handler.on_alert(alert);
        }
    }

    fn on_resolve(&self, alert: &TriggeredAlert) {
        for handler in &self.handlers {
            handler.on_resolve(alert);
        }
    }
}

type AlertCallback = Box<dyn Fn(&TriggeredAlert) + Send + Sync>;

/// Handler backed by host-supplied closures
#[derive(Default)]
pub struct CallbackAlertHandler {
    on_alert: Option<AlertCallback>,
    on_resolve: Option<AlertCallback>,
}

impl CallbackAlertHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alert_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&TriggeredAlert) + Send + Sync + 'static,
    {
        self.on_alert = Some(Box::new(f));
        self
    }

    pub fn with_resolve_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&TriggeredAlert) + Send + Sync + 'static,
    {
        self.on_resolve = Some(Box::new(f));
        self
    }
}

impl AlertHandler for CallbackAlertHandler {
    fn on_alert(&self, alert: &TriggeredAlert) {
        if let Some(f) = &self.on_alert {
            f(alert);
        }
    }

    fn on_resolve(&self, alert: &TriggeredAlert) {
        if let Some(f) = &self.on_resolve {
            f(alert);
        }
    }
}
