// recording/model.rs - Recorded events, sealed recordings and the export envelope

use chrono::{DateTime, Utc};
use cognitive_common::error::{SerializationError, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Version written into exported recordings
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// One captured runtime event.
///
/// `payload` is opaque: the recorder and replayer never look inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub id: String,
    pub event_type: String,
    /// Milliseconds since the recording started
    pub relative_time_ms: u64,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

/// A sealed, immutable sequence of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecording {
    pub id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub event_count: usize,
    /// Set when events were dropped at the per-recording cap
    #[serde(default)]
    pub truncated: bool,
    pub events: Vec<RecordedEvent>,
}

impl EventRecording {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Structural checks applied to imported recordings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required("id"));
        }
        if self.event_count != self.events.len() {
            return Err(ValidationError::Custom(format!(
                "eventCount is {} but {} events are present",
                self.event_count,
                self.events.len()
            )));
        }

        let mut previous = 0;
        for event in &self.events {
            if event.relative_time_ms < previous {
                return Err(ValidationError::invalid_format(
                    "events",
                    format!(
                        "event '{}' at {}ms precedes an earlier event at {}ms",
                        event.id, event.relative_time_ms, previous
                    ),
                ));
            }
            previous = event.relative_time_ms;
        }

        if self.duration_ms < previous {
            return Err(ValidationError::out_of_range(
                "duration",
                self.duration_ms,
                previous,
                u64::MAX,
            ));
        }
        Ok(())
    }

    /// Event count per event type
    pub fn event_types(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Pretty JSON document `{ "version": 1, "recording": {...} }`
    pub fn to_export_json(&self) -> Result<String, SerializationError> {
        let envelope = ExportEnvelopeRef {
            version: EXPORT_FORMAT_VERSION,
            recording: self,
        };
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Parse an exported document. Structure is not validated here.
    ///
    /// The version is read on its own first, so documents written by other
    /// format versions fail as `UnsupportedVersion` whatever their body looks like.
    pub fn from_export_json(text: &str) -> Result<Self, SerializationError> {
        let header: ExportHeader = serde_json::from_str(text)?;
        if header.version != EXPORT_FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion {
                found: header.version,
                expected: EXPORT_FORMAT_VERSION,
            });
        }
        let envelope: ExportEnvelope = serde_json::from_str(text)?;
        Ok(envelope.recording)
    }
}

#[derive(Serialize)]
struct ExportEnvelopeRef<'a> {
    version: u32,
    recording: &'a EventRecording,
}

#[derive(Deserialize)]
struct ExportHeader {
    version: u32,
}

#[derive(Deserialize)]
struct ExportEnvelope {
    version: u32,
    recording: EventRecording,
}
