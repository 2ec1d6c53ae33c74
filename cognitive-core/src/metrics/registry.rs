// metrics/registry.rs - Counters, gauges and bounded histograms

use chrono::Utc;
use cognitive_common::error::{SerializationError, ValidationError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;
use tracing::{debug, info};

use super::errors::{MetricError, MetricResult};
use super::export;
use super::snapshot::{percentile_owned, MetricsSnapshot};
use super::types::{metric_key, MetricAggregation, MetricType, Tags};

/// Default number of samples retained per histogram
pub const DEFAULT_HISTOGRAM_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct RegistryState {
    counters: BTreeMap<String, f64>,
    gauges: BTreeMap<String, f64>,
    histograms: BTreeMap<String, VecDeque<f64>>,
    aggregations: BTreeMap<String, MetricAggregation>,
}

impl RegistryState {
    /// Reject writes that would reuse a key under a different metric kind
    fn check_type(&self, key: &str, requested: MetricType) -> MetricResult<()> {
        match self.aggregations.get(key) {
            Some(agg) if agg.metric_type != requested => Err(MetricError::TypeMismatch {
                key: key.to_string(),
                existing: agg.metric_type,
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn aggregate(
        &mut self,
        key: String,
        name: &str,
        tags: Option<&Tags>,
        metric_type: MetricType,
        value: f64,
    ) {
        let now = Utc::now();
        self.aggregations
            .entry(key)
            .and_modify(|agg| agg.record(value, now))
            .or_insert_with(|| MetricAggregation::new(name, tags, metric_type, value, now));
    }
}

/// In-process metric store fed by the runtime.
///
/// Every operation takes the single table lock for its whole duration, so a
/// reader never observes a metric in a half-updated state.
#[derive(Debug)]
pub struct MetricRegistry {
    state: RwLock<RegistryState>,
    histogram_capacity: usize,
    started_at: Instant,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HISTOGRAM_CAPACITY)
    }
}

impl MetricRegistry {
    /// Create a registry retaining at most `histogram_capacity` samples per
    /// histogram (minimum 1)
    pub fn new(histogram_capacity: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            histogram_capacity: histogram_capacity.max(1),
            started_at: Instant::now(),
        }
    }

    pub fn histogram_capacity(&self) -> usize {
        self.histogram_capacity
    }

    /// Add `amount` to a counter, creating it at 0 on first use
    pub fn increment(&self, name: &str, amount: f64, tags: Option<&Tags>) -> MetricResult<()> {
        validate_name(name)?;
        let amount = ValidationError::ensure_finite("amount", amount)?;
        if amount < 0.0 {
            return Err(ValidationError::out_of_range("amount", amount, 0, "+inf").into());
        }

        let key = metric_key(name, tags);
        let mut state = self.state.write();
        state.check_type(&key, MetricType::Counter)?;

        let total = {
            let counter = state.counters.entry(key.clone()).or_insert(0.0);
            *counter += amount;
            *counter
        };
        state.aggregate(key, name, tags, MetricType::Counter, total);
        Ok(())
    }

    /// Add 1 to an untagged counter
    pub fn increment_by_one(&self, name: &str) -> MetricResult<()> {
        self.increment(name, 1.0, None)
    }

    /// Overwrite a gauge's current value
    pub fn set_gauge(&self, name: &str, value: f64, tags: Option<&Tags>) -> MetricResult<()> {
        validate_name(name)?;
        let value = ValidationError::ensure_finite("value", value)?;

        let key = metric_key(name, tags);
        let mut state = self.state.write();
        state.check_type(&key, MetricType::Gauge)?;

        state.gauges.insert(key.clone(), value);
        state.aggregate(key, name, tags, MetricType::Gauge, value);
        Ok(())
    }

    /// Append a histogram sample, evicting the oldest one when full
    pub fn observe(&self, name: &str, value: f64, tags: Option<&Tags>) -> MetricResult<()> {
        validate_name(name)?;
        let value = ValidationError::ensure_finite("value", value)?;

        let key = metric_key(name, tags);
        let capacity = self.histogram_capacity;
        let mut state = self.state.write();
        state.check_type(&key, MetricType::Histogram)?;

        let samples = state
            .histograms
            .entry(key.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity.min(1024)));
        if samples.len() == capacity {
            samples.pop_front();
        }
        samples.push_back(value);

        state.aggregate(key, name, tags, MetricType::Histogram, value);
        Ok(())
    }

    /// Current counter value, `None` if never incremented
    pub fn counter(&self, name: &str, tags: Option<&Tags>) -> Option<f64> {
        self.state.read().counters.get(&metric_key(name, tags)).copied()
    }

    /// Current gauge value, `None` if never set
    pub fn gauge(&self, name: &str, tags: Option<&Tags>) -> Option<f64> {
        self.state.read().gauges.get(&metric_key(name, tags)).copied()
    }

    /// Nearest-rank percentile over an untagged histogram's retained samples.
    /// Returns 0 when the histogram has no samples.
    pub fn get_percentile(&self, name: &str, p: f64) -> f64 {
        self.get_percentile_tagged(name, None, p)
    }

    pub fn get_percentile_tagged(&self, name: &str, tags: Option<&Tags>, p: f64) -> f64 {
        let state = self.state.read();
        state
            .histograms
            .get(&metric_key(name, tags))
            .and_then(|samples| percentile_owned(samples.iter().copied().collect(), p))
            .unwrap_or(0.0)
    }

    /// Number of distinct metric keys
    pub fn metric_count(&self) -> usize {
        self.state.read().aggregations.len()
    }

    /// Consistent copy of every table
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            counters: state.counters.clone(),
            gauges: state.gauges.clone(),
            histograms: state
                .histograms
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().copied().collect()))
                .collect(),
            aggregations: state.aggregations.clone(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        }
    }

    /// Serialize the current snapshot as pretty JSON
    pub fn export_json(&self) -> Result<String, SerializationError> {
        export::to_json(&self.snapshot())
    }

    /// Serialize the current snapshot in the Prometheus text format
    pub fn export_prometheus(&self) -> String {
        export::to_prometheus(&self.snapshot())
    }

    /// Drop every metric
    pub fn reset(&self) {
        let mut state = self.state.write();
        let dropped = state.aggregations.len();
        *state = RegistryState::default();
        info!(dropped, "Metric registry reset");
    }
}

fn validate_name(name: &str) -> MetricResult<()> {
    if name.trim().is_empty() {
        debug!("Rejected metric write with empty name");
        return Err(MetricError::InvalidName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_counter_sums_increments() {
        let registry = MetricRegistry::default();
        for amount in [1.0, 2.5, 0.0, 4.0] {
            registry.increment("thoughts_total", amount, None).unwrap();
        }

        assert_eq!(registry.counter("thoughts_total", None), Some(7.5));
    }

    #[test]
    fn test_counter_rejects_negative_and_non_finite() {
        let registry = MetricRegistry::default();
        registry.increment("errors", 3.0, None).unwrap();

        assert!(registry.increment("errors", -1.0, None).is_err());
        assert!(registry.increment("errors", f64::NAN, None).is_err());
        assert_eq!(registry.counter("errors", None), Some(3.0));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = MetricRegistry::default();
        assert_eq!(
            registry.set_gauge("  ", 1.0, None),
            Err(MetricError::InvalidName)
        );
        assert_eq!(registry.metric_count(), 0);
    }

    #[test]
    fn test_gauge_last_write_wins() {
        let registry = MetricRegistry::default();
        registry.set_gauge("queue_depth", 10.0, None).unwrap();
        registry.set_gauge("queue_depth", 3.0, None).unwrap();

        assert_eq!(registry.gauge("queue_depth", None), Some(3.0));
        let snapshot = registry.snapshot();
        let agg = &snapshot.aggregations["queue_depth"];
        assert_eq!(agg.count, 2);
        assert_eq!(agg.max, 10.0);
        assert_eq!(agg.last, 3.0);
    }

    #[test]
    fn test_tagged_metrics_are_distinct() {
        let registry = MetricRegistry::default();
        let planner = tags(&[("agent", "planner")]);
        let critic = tags(&[("agent", "critic")]);

        registry.increment("steps", 2.0, Some(&planner)).unwrap();
        registry.increment("steps", 5.0, Some(&critic)).unwrap();

        assert_eq!(registry.counter("steps", Some(&planner)), Some(2.0));
        assert_eq!(registry.counter("steps", Some(&critic)), Some(5.0));
        assert_eq!(registry.counter("steps", None), None);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let registry = MetricRegistry::default();
        registry.increment("load", 1.0, None).unwrap();

        let err = registry.set_gauge("load", 0.5, None).unwrap_err();
        assert!(matches!(err, MetricError::TypeMismatch { .. }));
        assert_eq!(registry.gauge("load", None), None);
    }

    #[test]
    fn test_percentile_median_and_max() {
        let registry = MetricRegistry::default();
        for v in [5.0, 1.0, 4.0, 2.0, 3.0] {
            registry.observe("latency_ms", v, None).unwrap();
        }

        assert_eq!(registry.get_percentile("latency_ms", 50.0), 3.0);
        assert_eq!(registry.get_percentile("latency_ms", 100.0), 5.0);
        // Retained order is untouched by the query
        assert_eq!(
            registry.snapshot().histograms["latency_ms"],
            vec![5.0, 1.0, 4.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_percentile_without_samples_is_zero() {
        let registry = MetricRegistry::default();
        assert_eq!(registry.get_percentile("missing", 95.0), 0.0);
    }

    #[test]
    fn test_histogram_evicts_oldest_but_avg_stays_exact() {
        let registry = MetricRegistry::new(3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            registry.observe("latency_ms", v, None).unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.histograms["latency_ms"], vec![1.0, 2.0, 3.0]);
        assert_eq!(registry.get_percentile("latency_ms", 100.0), 3.0);

        let agg = &snapshot.aggregations["latency_ms"];
        assert_eq!(agg.count, 4);
        assert_eq!(agg.max, 100.0);
        assert_eq!(agg.avg, 26.5);
    }

    #[test]
    fn test_snapshot_is_detached_from_later_writes() {
        let registry = MetricRegistry::default();
        registry.increment("errors", 1.0, None).unwrap();
        let snapshot = registry.snapshot();

        registry.increment("errors", 1.0, None).unwrap();

        assert_eq!(snapshot.counter("errors"), Some(1.0));
        assert_eq!(registry.counter("errors", None), Some(2.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let registry = MetricRegistry::default();
        registry.increment("errors", 1.0, None).unwrap();
        registry.set_gauge("queue_depth", 1.0, None).unwrap();
        registry.observe("latency_ms", 1.0, None).unwrap();

        registry.reset();

        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.metric_count(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let registry = Arc::new(MetricRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry.increment_by_one("events").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.counter("events", None), Some(8000.0));
    }
}
