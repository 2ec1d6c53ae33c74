use thiserror::Error;

/// A setting that the components cannot run with.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("invalid setting {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Lookup failures against an owned catalog (rules, alerts, recordings).
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EntityError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl EntityError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EntityError::NotFound { kind, id: id.into() }
    }

    /// Id of the entity the error refers to
    pub fn id(&self) -> &str {
        match self {
            EntityError::NotFound { id, .. } => id,
        }
    }
}

/// Failures reading or writing the JSON interchange documents.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SerializationError {
    #[error("malformed JSON: {0}")]
    Json(String),

    #[error("format version {found} is not supported (this build reads {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::Json(err.to_string())
    }
}

/// Caller input rejected before it reaches shared state.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("{field} is required and must not be empty")]
    Required { field: &'static str },

    #[error("{field} must be finite (got {value})")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} = {value} lies outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("malformed {field}: {reason}")]
    InvalidFormat { field: &'static str, reason: String },

    /// Cross-field check that names no single field
    #[error("{0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &'static str) -> Self {
        ValidationError::Required { field }
    }

    pub fn out_of_range(
        field: &'static str,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn invalid_format(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field,
            reason: reason.into(),
        }
    }

    /// Pass `value` through, or fail with `NotFinite` for NaN and infinities
    pub fn ensure_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ValidationError::NotFinite { field, value })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_kind_and_id() {
        let err = EntityError::not_found("Recording", "rec-42");

        assert_eq!(err.to_string(), "Recording not found: rec-42");
        assert_eq!(err.id(), "rec-42");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::required("metric").to_string(),
            "metric is required and must not be empty"
        );
        assert!(ValidationError::out_of_range("percentile", 150, 0, 100)
            .to_string()
            .contains("lies outside [0, 100]"));
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ValidationError::ensure_finite("value", 1.5), Ok(1.5));
        assert!(matches!(
            ValidationError::ensure_finite("value", f64::INFINITY),
            Err(ValidationError::NotFinite { field: "value", .. })
        ));
        assert!(ValidationError::ensure_finite("value", f64::NAN).is_err());
    }

    #[test]
    fn test_serde_error_converts_to_json_variant() {
        let err = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();

        let err = SerializationError::from(err);

        assert!(matches!(err, SerializationError::Json(_)));
    }

    #[test]
    fn test_unsupported_version_message() {
        let err = SerializationError::UnsupportedVersion { found: 7, expected: 1 };
        assert_eq!(err.to_string(), "format version 7 is not supported (this build reads 1)");
    }
}
