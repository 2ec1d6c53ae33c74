// metrics/snapshot.rs - Immutable point-in-time view of the registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MetricAggregation;

/// Point-in-time copy of every metric table.
///
/// Built under a single read lock, so no write is ever half-visible. Maps are
/// keyed by metric key (see [`metric_key`](super::metric_key)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    /// Retained samples, oldest first
    pub histograms: BTreeMap<String, Vec<f64>>,
    pub aggregations: BTreeMap<String, MetricAggregation>,
    pub uptime_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn counter(&self, key: &str) -> Option<f64> {
        self.counters.get(key).copied()
    }

    pub fn gauge(&self, key: &str) -> Option<f64> {
        self.gauges.get(key).copied()
    }

    pub fn histogram(&self, key: &str) -> Option<&[f64]> {
        self.histograms.get(key).map(|s| s.as_slice())
    }

    /// Percentile over a histogram's retained samples, `None` when the key is
    /// unknown or has no samples
    pub fn percentile(&self, key: &str, p: f64) -> Option<f64> {
        self.histogram(key).and_then(|samples| percentile(samples, p))
    }

    /// Total number of metric keys across all kinds
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len() + self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-rank percentile.
///
/// Sorts a copy of `samples`, so the caller's order is untouched. `p` is
/// clamped to 0..=100; rank is `ceil(p/100 * n)` clamped to at least 1, so
/// p=0 yields the minimum and p=100 the maximum.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    percentile_owned(samples.to_vec(), p)
}

/// Same as [`percentile`] over samples the caller already copied
pub(crate) fn percentile_owned(mut sorted: Vec<f64>, p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    sorted.sort_by(|a, b| a.total_cmp(b));

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[idx])
}
