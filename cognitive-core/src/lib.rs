// cognitive-core library: metric registry, alert engine and event
// recorder/replayer for cognitive runtimes
// Error taxonomy and logging setup are in cognitive-common crate

pub mod alerting;
pub mod cli;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod observability;
pub mod recording;
pub mod telemetry;

pub use alerting::{AlertEngine, AlertRule, AlertSeverity, TriggeredAlert};
pub use clock::{Clock, TokioClock};
pub use metrics::{MetricRegistry, MetricsSnapshot, Tags};
pub use observability::{Observability, Parts};
pub use recording::{EventRecorder, EventRecording, RecordedEvent, ReplayOptions, Replayer};

// Re-export cognitive-common for convenience
pub use cognitive_common::{error, logging};
