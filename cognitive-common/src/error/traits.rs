use super::common::{ConfigurationError, EntityError, SerializationError, ValidationError};

/// How a failure should be treated by whoever called the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// May succeed if the same call is made later (a metric not yet written)
    Transient,
    /// Bad input or a missing entity; retrying changes nothing
    Permanent,
    /// A recording or replay is already in flight
    Conflict,
    /// Settings rejected at startup
    Configuration,
}

/// Errors that know their own [`ErrorCategory`].
///
/// ```rust,ignore
/// if let Err(e) = recorder.start_recording(None) {
///     if e.is_conflict() {
///         tracing::debug!("recorder already armed");
///     }
/// }
/// ```
pub trait ErrorClassification {
    fn category(&self) -> ErrorCategory;

    fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    fn is_permanent(&self) -> bool {
        self.category() == ErrorCategory::Permanent
    }

    fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

impl ErrorClassification for ConfigurationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl ErrorClassification for EntityError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

impl ErrorClassification for SerializationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

impl ErrorClassification for ValidationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_errors_are_not_retryable() {
        assert!(EntityError::not_found("AlertRule", "r1").is_permanent());
        assert!(ValidationError::required("id").is_permanent());
        assert!(!SerializationError::Json("eof".into()).is_transient());
    }

    #[test]
    fn test_configuration_category() {
        let err = ConfigurationError::invalid_value("replay.default_speed", "must be positive");

        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.is_conflict());
    }
}
