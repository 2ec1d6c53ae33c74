// alerting/errors.rs - Errors surfaced by the alert engine

use cognitive_common::error::{ErrorCategory, ErrorClassification, ValidationError};
use thiserror::Error;

/// Errors that can occur during alert rule management and evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AlertError {
    /// Rule rejected at the call boundary; the rule set is unchanged
    #[error("Invalid alert rule: {0}")]
    Validation(#[from] ValidationError),

    /// No rule with this id
    #[error("Alert rule not found: {0}")]
    RuleNotFound(String),

    /// No active alert with this id
    #[error("Active alert not found: {0}")]
    AlertNotFound(String),

    /// A single rule could not resolve its metric. Never aborts a pass.
    #[error("Evaluation of rule '{rule_id}' failed: {reason}")]
    Evaluation { rule_id: String, reason: String },
}

impl ErrorClassification for AlertError {
    fn category(&self) -> ErrorCategory {
        match self {
            AlertError::Validation(_) => ErrorCategory::Permanent,
            AlertError::RuleNotFound(_) => ErrorCategory::Permanent,
            AlertError::AlertNotFound(_) => ErrorCategory::Permanent,
            // The metric may show up on a later pass
            AlertError::Evaluation { .. } => ErrorCategory::Transient,
        }
    }
}

/// Result type for alert operations
pub type AlertResult<T> = Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_error_display() {
        let err = AlertError::RuleNotFound("errors".to_string());
        assert_eq!(err.to_string(), "Alert rule not found: errors");

        let err: AlertError = ValidationError::required("metric").into();
        assert!(err.to_string().contains("metric is required"));
    }

    #[test]
    fn test_alert_error_classification() {
        let err = AlertError::Evaluation {
            rule_id: "r".to_string(),
            reason: "missing".to_string(),
        };
        assert!(err.is_transient());
        assert!(AlertError::AlertNotFound("a".to_string()).is_permanent());
    }
}
