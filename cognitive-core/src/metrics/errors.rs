// metrics/errors.rs - Errors raised at the registry call boundary

use cognitive_common::error::{ErrorCategory, ErrorClassification, ValidationError};
use thiserror::Error;

use super::MetricType;

/// Errors returned by metric writes. State is unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MetricError {
    /// Metric name is empty
    #[error("Metric name must not be empty")]
    InvalidName,

    /// Value rejected (non-finite, or a negative counter increment)
    #[error(transparent)]
    InvalidValue(#[from] ValidationError),

    /// Key is already registered as a different metric kind
    #[error("Metric '{key}' is a {existing}, cannot use it as a {requested}")]
    TypeMismatch {
        key: String,
        existing: MetricType,
        requested: MetricType,
    },
}

impl ErrorClassification for MetricError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

/// Result type for metric writes
pub type MetricResult<T> = Result<T, MetricError>;
