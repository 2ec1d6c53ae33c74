// recording/recorder.rs - Event capture and the in-memory recording catalog

use chrono::{DateTime, SecondsFormat, Utc};
use cognitive_common::error::{EntityError, ValidationError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::{RecordingError, RecordingResult};
use super::{EventRecording, EventSink, RecordedEvent};
use crate::clock::{Clock, TokioClock};
use crate::telemetry;

pub const DEFAULT_MAX_RECORDINGS: usize = 50;
pub const DEFAULT_MAX_EVENTS_PER_RECORDING: usize = 10_000;

/// Size caps for the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderLimits {
    /// Sealed recordings kept in the catalog; the oldest is evicted first
    pub max_recordings: usize,
    /// Events kept per recording; later events are dropped
    pub max_events_per_recording: usize,
}

impl Default for RecorderLimits {
    fn default() -> Self {
        Self {
            max_recordings: DEFAULT_MAX_RECORDINGS,
            max_events_per_recording: DEFAULT_MAX_EVENTS_PER_RECORDING,
        }
    }
}

/// Recording being filled
#[derive(Debug)]
struct LiveRecording {
    id: String,
    name: String,
    started_at: DateTime<Utc>,
    started: Instant,
    events: Vec<RecordedEvent>,
    dropped: u64,
}

#[derive(Debug, Default)]
struct RecorderState {
    live: Option<LiveRecording>,
    /// Oldest first
    catalog: VecDeque<Arc<EventRecording>>,
}

impl RecorderState {
    fn position(&self, id: &str) -> Option<usize> {
        self.catalog.iter().position(|r| r.id == id)
    }

    /// Insert, replacing an entry with the same id, then evict beyond `max`.
    /// Returns how many entries were evicted.
    fn store(&mut self, recording: Arc<EventRecording>, max: usize) -> usize {
        if let Some(idx) = self.position(&recording.id) {
            self.catalog.remove(idx);
            telemetry::RECORDINGS_STORED.dec();
        }
        self.catalog.push_back(recording);
        telemetry::RECORDINGS_STORED.inc();

        let mut evicted = 0;
        while self.catalog.len() > max {
            if let Some(old) = self.catalog.pop_front() {
                debug!(recording = %old.id, "Evicted oldest recording");
                telemetry::RECORDINGS_STORED.dec();
                evicted += 1;
            }
        }
        evicted
    }
}

/// Captures runtime events into recordings and keeps a bounded catalog.
///
/// At most one recording is armed at a time.
#[derive(Debug)]
pub struct EventRecorder {
    clock: Arc<dyn Clock>,
    limits: RecorderLimits,
    state: Mutex<RecorderState>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock), RecorderLimits::default())
    }
}

impl EventRecorder {
    pub fn new(clock: Arc<dyn Clock>, limits: RecorderLimits) -> Self {
        Self {
            clock,
            limits: RecorderLimits {
                max_recordings: limits.max_recordings.max(1),
                max_events_per_recording: limits.max_events_per_recording.max(1),
            },
            state: Mutex::new(RecorderState::default()),
        }
    }

    pub fn limits(&self) -> RecorderLimits {
        self.limits
    }

    /// Arm a new recording and return its id.
    ///
    /// Fails without touching the armed recording if one is already running.
    pub fn start_recording(&self, name: Option<&str>) -> RecordingResult<String> {
        let mut state = self.state.lock();
        if let Some(live) = &state.live {
            return Err(RecordingError::AlreadyRecording {
                id: live.id.clone(),
            });
        }

        let started_at = self.clock.wall_time();
        let name = match name {
            Some(n) => n.to_string(),
            None => format!(
                "Recording {}",
                started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
        };
        let id = Uuid::new_v4().to_string();

        info!(recording = %id, name = %name, "Recording started");
        state.live = Some(LiveRecording {
            id: id.clone(),
            name,
            started_at,
            started: self.clock.now(),
            events: Vec::new(),
            dropped: 0,
        });
        Ok(id)
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().live.is_some()
    }

    /// Append an event to the armed recording.
    ///
    /// Returns `false` when nothing is armed or the event hit the size cap.
    pub fn capture(&self, event_type: &str, payload: impl Into<String>) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let Some(live) = state.live.as_mut() else {
            return false;
        };

        if live.events.len() >= self.limits.max_events_per_recording {
            if live.dropped == 0 {
                warn!(
                    recording = %live.id,
                    cap = self.limits.max_events_per_recording,
                    "Recording reached its event cap, dropping further events"
                );
            }
            live.dropped += 1;
            telemetry::EVENTS_DROPPED_TOTAL.inc();
            return false;
        }

        let relative_time_ms = now.duration_since(live.started).as_millis() as u64;
        live.events.push(RecordedEvent {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            relative_time_ms,
            payload: payload.into(),
            timestamp: self.clock.wall_time(),
        });
        telemetry::EVENTS_RECORDED_TOTAL.inc();
        true
    }

    /// Copy of the events captured so far
    pub fn current_recording_events(&self) -> Vec<RecordedEvent> {
        self.state
            .lock()
            .live
            .as_ref()
            .map(|live| live.events.clone())
            .unwrap_or_default()
    }

    /// Seal the armed recording and add it to the catalog
    pub fn stop_recording(&self) -> RecordingResult<Arc<EventRecording>> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let live = state.live.take().ok_or(RecordingError::NotRecording)?;

        let last_event_ms = live.events.last().map_or(0, |e| e.relative_time_ms);
        let duration_ms = (now.duration_since(live.started).as_millis() as u64).max(last_event_ms);
        let recording = Arc::new(EventRecording {
            id: live.id,
            name: live.name,
            started_at: live.started_at,
            duration_ms,
            event_count: live.events.len(),
            truncated: live.dropped > 0,
            events: live.events,
        });

        let evicted = state.store(recording.clone(), self.limits.max_recordings);
        info!(
            recording = %recording.id,
            events = recording.event_count,
            duration_ms,
            truncated = recording.truncated,
            evicted,
            "Recording stopped"
        );
        Ok(recording)
    }

    /// Sealed recordings, oldest first
    pub fn list_recordings(&self) -> Vec<Arc<EventRecording>> {
        self.state.lock().catalog.iter().cloned().collect()
    }

    pub fn get_recording(&self, id: &str) -> Option<Arc<EventRecording>> {
        let state = self.state.lock();
        state.position(id).map(|idx| state.catalog[idx].clone())
    }

    pub fn delete_recording(&self, id: &str) -> RecordingResult<()> {
        let mut state = self.state.lock();
        let idx = state
            .position(id)
            .ok_or_else(|| EntityError::not_found("Recording", id))?;
        state.catalog.remove(idx);
        telemetry::RECORDINGS_STORED.dec();
        debug!(recording = %id, "Recording deleted");
        Ok(())
    }

    /// Drop every sealed recording. An armed recording is unaffected.
    pub fn clear_recordings(&self) -> usize {
        let mut state = self.state.lock();
        let cleared = state.catalog.len();
        state.catalog.clear();
        telemetry::RECORDINGS_STORED.sub(cleared as i64);
        info!(cleared, "Recording catalog cleared");
        cleared
    }

    /// Serialize a recording to the interchange format
    pub fn export_recording(&self, recording: &EventRecording) -> RecordingResult<String> {
        Ok(recording.to_export_json()?)
    }

    /// Parse, validate and catalog an exported recording.
    ///
    /// Recordings holding more events than `max_events_per_recording` are
    /// rejected, the same cap live capture enforces. On any error the catalog
    /// is unchanged.
    pub fn import_recording(&self, text: &str) -> RecordingResult<Arc<EventRecording>> {
        let recording = EventRecording::from_export_json(text)?;
        recording.validate()?;
        let cap = self.limits.max_events_per_recording;
        if recording.events.len() > cap {
            let err = ValidationError::out_of_range("events", recording.events.len(), 0, cap);
            return Err(err.into());
        }

        let recording = Arc::new(recording);
        let evicted = self
            .state
            .lock()
            .store(recording.clone(), self.limits.max_recordings);
        info!(
            recording = %recording.id,
            events = recording.event_count,
            evicted,
            "Recording imported"
        );
        Ok(recording)
    }
}

/// Replays routed into a recorder are captured like live events
impl EventSink for EventRecorder {
    fn emit(&self, event: &RecordedEvent) {
        self.capture(&event.event_type, event.payload.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limits(max_recordings: usize, max_events: usize) -> RecorderLimits {
        RecorderLimits {
            max_recordings,
            max_events_per_recording: max_events,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_and_stop() {
        let recorder = EventRecorder::default();
        assert!(!recorder.is_recording());

        let id = recorder.start_recording(Some("session")).unwrap();
        assert!(recorder.is_recording());

        recorder.capture("thought", "a");
        tokio::time::advance(Duration::from_millis(40)).await;
        recorder.capture("action", "b");
        assert_eq!(recorder.current_recording_events().len(), 2);
        tokio::time::advance(Duration::from_millis(10)).await;

        let rec = recorder.stop_recording().unwrap();

        assert_eq!(rec.id, id);
        assert_eq!(rec.name, "session");
        assert_eq!(rec.event_count, 2);
        assert_eq!(rec.duration_ms, 50);
        assert_eq!(rec.events[0].relative_time_ms, 0);
        assert_eq!(rec.events[1].relative_time_ms, 40);
        assert_eq!(rec.events[1].payload, "b");
        assert!(!recorder.is_recording());
        assert!(recorder.current_recording_events().is_empty());
        assert_eq!(recorder.list_recordings().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_name_uses_timestamp() {
        let recorder = EventRecorder::default();
        recorder.start_recording(None).unwrap();
        let rec = recorder.stop_recording().unwrap();

        assert!(rec.name.starts_with("Recording "));
        assert!(rec.name.ends_with('Z'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_fails_without_disturbing_first() {
        let recorder = EventRecorder::default();
        let first = recorder.start_recording(Some("first")).unwrap();
        recorder.capture("thought", "x");

        let err = recorder.start_recording(Some("second")).unwrap_err();
        assert_eq!(err, RecordingError::AlreadyRecording { id: first.clone() });

        recorder.capture("thought", "y");
        let rec = recorder.stop_recording().unwrap();
        assert_eq!(rec.id, first);
        assert_eq!(rec.name, "first");
        assert_eq!(rec.event_count, 2);
    }

    #[test]
    fn test_stop_without_start() {
        let recorder = EventRecorder::default();
        assert_eq!(
            recorder.stop_recording().unwrap_err(),
            RecordingError::NotRecording
        );
    }

    #[test]
    fn test_capture_while_disarmed_is_noop() {
        let recorder = EventRecorder::default();
        assert!(!recorder.capture("thought", "ignored"));
        assert!(recorder.list_recordings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_cap_truncates() {
        let recorder = EventRecorder::new(Arc::new(TokioClock), limits(10, 2));
        recorder.start_recording(None).unwrap();

        assert!(recorder.capture("e", "1"));
        assert!(recorder.capture("e", "2"));
        assert!(!recorder.capture("e", "3"));

        let rec = recorder.stop_recording().unwrap();
        assert_eq!(rec.event_count, 2);
        assert!(rec.truncated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_evicts_oldest() {
        let recorder = EventRecorder::new(Arc::new(TokioClock), limits(2, 10));
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            ids.push(recorder.start_recording(Some(name)).unwrap());
            recorder.stop_recording().unwrap();
        }

        let names: Vec<_> = recorder
            .list_recordings()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(recorder.get_recording(&ids[0]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_clear() {
        let recorder = EventRecorder::default();
        recorder.start_recording(None).unwrap();
        let rec = recorder.stop_recording().unwrap();

        assert!(matches!(
            recorder.delete_recording("missing"),
            Err(RecordingError::Entity(_))
        ));
        recorder.delete_recording(&rec.id).unwrap();
        assert!(recorder.get_recording(&rec.id).is_none());

        recorder.start_recording(None).unwrap();
        recorder.stop_recording().unwrap();
        assert_eq!(recorder.clear_recordings(), 1);
        assert!(recorder.list_recordings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_import_round_trip() {
        let recorder = EventRecorder::default();
        recorder.start_recording(Some("trip")).unwrap();
        for i in 0..3 {
            recorder.capture("step", format!("{{\"i\":{}}}", i));
            tokio::time::advance(Duration::from_millis(25)).await;
        }
        let original = recorder.stop_recording().unwrap();
        let text = recorder.export_recording(&original).unwrap();

        let other = EventRecorder::default();
        let imported = other.import_recording(&text).unwrap();

        assert_eq!(imported.event_count, original.event_count);
        assert_eq!(imported.duration_ms, original.duration_ms);
        let times: Vec<_> = imported.events.iter().map(|e| e.relative_time_ms).collect();
        assert_eq!(times, vec![0, 25, 50]);
        assert_eq!(other.get_recording(&original.id).as_deref(), Some(&*original));
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_replaces_same_id() {
        let recorder = EventRecorder::default();
        recorder.start_recording(Some("v1")).unwrap();
        let rec = recorder.stop_recording().unwrap();

        let mut renamed = (*rec).clone();
        renamed.name = "v2".to_string();
        recorder
            .import_recording(&renamed.to_export_json().unwrap())
            .unwrap();

        let all = recorder.list_recordings();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "v2");
    }

    #[test]
    fn test_invalid_import_leaves_catalog_unchanged() {
        let recorder = EventRecorder::default();

        assert!(matches!(
            recorder.import_recording("not json"),
            Err(RecordingError::Serialization(_))
        ));

        let inconsistent = r#"{
            "version": 1,
            "recording": {
                "id": "r", "name": "n", "startedAt": "2026-01-01T00:00:00Z",
                "durationMs": 10, "eventCount": 5, "events": []
            }
        }"#;
        assert!(matches!(
            recorder.import_recording(inconsistent),
            Err(RecordingError::Invalid(_))
        ));
        assert!(recorder.list_recordings().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_enforces_event_cap() {
        // Given: a three-event export and a recorder capped at two events
        let source = EventRecorder::default();
        source.start_recording(Some("big")).unwrap();
        for i in 0..3 {
            source.capture("step", i.to_string());
        }
        let text = source.export_recording(&source.stop_recording().unwrap()).unwrap();
        let capped = EventRecorder::new(Arc::new(TokioClock), limits(10, 2));

        // When / Then: the import is refused and nothing is cataloged
        let err = capped.import_recording(&text).unwrap_err();
        assert!(matches!(
            err,
            RecordingError::Invalid(ValidationError::OutOfRange { field: "events", .. })
        ));
        assert!(capped.list_recordings().is_empty());

        // A recorder with room takes it
        let roomy = EventRecorder::new(Arc::new(TokioClock), limits(10, 3));
        assert_eq!(roomy.import_recording(&text).unwrap().event_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_as_event_sink() {
        let recorder = EventRecorder::default();
        recorder.start_recording(None).unwrap();

        let event = RecordedEvent {
            id: "e1".to_string(),
            event_type: "thought".to_string(),
            relative_time_ms: 500,
            payload: "p".to_string(),
            timestamp: Utc::now(),
        };
        recorder.emit(&event);

        let events = recorder.current_recording_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "thought");
        assert_eq!(events[0].relative_time_ms, 0);
    }
}
