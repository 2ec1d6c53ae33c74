// recording/sink.rs - Destinations for replayed events

use super::RecordedEvent;

/// Receives events re-emitted by a replay
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RecordedEvent);
}

/// Sink that writes each event to the tracing log
#[derive(Debug, Clone, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &RecordedEvent) {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            relative_ms = event.relative_time_ms,
            payload_len = event.payload.len(),
            "Replayed event"
        );
    }
}
