// recording/mod.rs - Event recording, catalog and timed replay

mod errors;
mod model;
mod recorder;
mod replay;
mod sink;

pub use errors::{RecordingError, RecordingResult, ReplayError, ReplayResult};
pub use model::{EventRecording, RecordedEvent, EXPORT_FORMAT_VERSION};
pub use recorder::{
    EventRecorder, RecorderLimits, DEFAULT_MAX_EVENTS_PER_RECORDING, DEFAULT_MAX_RECORDINGS,
};
pub use replay::{ReplayOptions, ReplayProgress, ReplayReport, ReplayStatus, Replayer};
pub use sink::{EventSink, LogEventSink};
