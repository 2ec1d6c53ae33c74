// metrics/mod.rs - In-process metric registry consumed by the alert engine

mod errors;
mod export;
mod registry;
mod snapshot;
mod types;

pub use errors::{MetricError, MetricResult};
pub use export::{sanitize_metric_name, to_json, to_prometheus};
pub use registry::{MetricRegistry, DEFAULT_HISTOGRAM_CAPACITY};
pub use snapshot::{percentile, MetricsSnapshot};
pub use types::{metric_key, MetricAggregation, MetricType, Tags};
