// metrics/types.rs - Metric kinds, keys and running aggregations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag set attached to a metric. Ordered so keys render deterministically.
pub type Tags = BTreeMap<String, String>;

/// Kind of metric stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Counter => write!(f, "counter"),
            MetricType::Gauge => write!(f, "gauge"),
            MetricType::Histogram => write!(f, "histogram"),
        }
    }
}

/// Build the storage key for a metric.
///
/// Untagged metrics are keyed by their bare name; tagged ones as
/// `name{a="1",b="2"}` with tag keys in sorted order and values escaped the
/// way the Prometheus text format escapes label values.
pub fn metric_key(name: &str, tags: Option<&Tags>) -> String {
    match tags {
        Some(tags) if !tags.is_empty() => format!("{}{{{}}}", name, render_labels(tags)),
        _ => name.to_string(),
    }
}

/// Render `k="v",...` without the surrounding braces
pub(crate) fn render_labels(tags: &Tags) -> String {
    tags.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Running aggregation for one metric key.
///
/// `avg` is derived from the running `sum` and `count`, never from the
/// bounded histogram buffer, so it stays exact after old samples are evicted.
/// The value stream fed in is the running total for counters, each written
/// value for gauges and each sample for histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAggregation {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub last: f64,
    pub last_updated: DateTime<Utc>,
}

impl MetricAggregation {
    pub(crate) fn new(
        name: &str,
        tags: Option<&Tags>,
        metric_type: MetricType,
        value: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.cloned().unwrap_or_default(),
            metric_type,
            count: 1,
            sum: value,
            min: value,
            max: value,
            avg: value,
            last: value,
            last_updated: now,
        }
    }

    pub(crate) fn record(&mut self, value: f64, now: DateTime<Utc>) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.avg = self.sum / self.count as f64;
        self.last = value;
        self.last_updated = now;
    }
}
