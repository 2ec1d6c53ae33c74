// recording/errors.rs - Recorder and replayer errors

use cognitive_common::error::{
    EntityError, ErrorCategory, ErrorClassification, SerializationError, ValidationError,
};
use thiserror::Error;

/// Errors from recording and the recording catalog
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecordingError {
    /// A recording is already armed
    #[error("Recording already in progress: {id}")]
    AlreadyRecording { id: String },

    #[error("No recording in progress")]
    NotRecording,

    /// Catalog lookup failed, e.g. an unknown recording id
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// Import text could not be parsed
    #[error("Failed to read recording: {0}")]
    Serialization(#[from] SerializationError),

    /// Import parsed but is structurally inconsistent
    #[error("Invalid recording: {0}")]
    Invalid(#[from] ValidationError),
}

impl ErrorClassification for RecordingError {
    fn category(&self) -> ErrorCategory {
        match self {
            RecordingError::AlreadyRecording { .. } => ErrorCategory::Conflict,
            RecordingError::NotRecording => ErrorCategory::Conflict,
            RecordingError::Entity(e) => e.category(),
            RecordingError::Serialization(e) => e.category(),
            RecordingError::Invalid(_) => ErrorCategory::Permanent,
        }
    }
}

/// Errors from starting a replay
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReplayError {
    #[error("Replay speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),

    /// Another replay is in flight
    #[error("A replay is already running")]
    AlreadyRunning,

    /// Catalog lookup failed, e.g. an unknown recording id
    #[error(transparent)]
    Entity(#[from] EntityError),
}

impl ErrorClassification for ReplayError {
    fn category(&self) -> ErrorCategory {
        match self {
            ReplayError::InvalidSpeed(_) => ErrorCategory::Permanent,
            ReplayError::AlreadyRunning => ErrorCategory::Conflict,
            ReplayError::Entity(e) => e.category(),
        }
    }
}

pub type RecordingResult<T> = Result<T, RecordingError>;
pub type ReplayResult<T> = Result<T, ReplayError>;
