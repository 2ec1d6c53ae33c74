// metrics/export.rs - JSON and Prometheus text renderings of a snapshot

use cognitive_common::error::SerializationError;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::snapshot::{percentile, MetricsSnapshot};
use super::types::{render_labels, MetricAggregation, MetricType, Tags};

/// Quantiles emitted for each histogram in the Prometheus export
const SUMMARY_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Pretty JSON document of the whole snapshot
pub fn to_json(snapshot: &MetricsSnapshot) -> Result<String, SerializationError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Prometheus text exposition of a snapshot.
///
/// Counters and gauges map one-to-one. Histograms are exposed as summaries
/// over the retained window plus all-time `_sum` and `_count`.
pub fn to_prometheus(snapshot: &MetricsSnapshot) -> String {
    // Group by family so tagged variants follow their # TYPE line
    let mut families: BTreeMap<(String, MetricType), Vec<(&String, &MetricAggregation)>> =
        BTreeMap::new();
    for (key, agg) in &snapshot.aggregations {
        families
            .entry((sanitize_metric_name(&agg.name), agg.metric_type))
            .or_default()
            .push((key, agg));
    }

    let mut out = String::new();
    for ((name, metric_type), members) in &families {
        let type_name = match metric_type {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "summary",
        };
        let _ = writeln!(out, "# TYPE {} {}", name, type_name);

        for (key, agg) in members {
            let labels = sanitize_tags(&agg.tags);
            match metric_type {
                MetricType::Counter => {
                    if let Some(value) = snapshot.counter(key) {
                        write_sample(&mut out, name, &labels, None, value);
                    }
                }
                MetricType::Gauge => {
                    if let Some(value) = snapshot.gauge(key) {
                        write_sample(&mut out, name, &labels, None, value);
                    }
                }
                MetricType::Histogram => {
                    let samples = snapshot.histogram(key).unwrap_or(&[]);
                    for q in SUMMARY_QUANTILES {
                        if let Some(value) = percentile(samples, q * 100.0) {
                            write_sample(&mut out, name, &labels, Some(q), value);
                        }
                    }
                    write_sample(&mut out, &format!("{}_sum", name), &labels, None, agg.sum);
                    write_sample(
                        &mut out,
                        &format!("{}_count", name),
                        &labels,
                        None,
                        agg.count as f64,
                    );
                }
            }
        }
    }
    out
}

fn write_sample(out: &mut String, name: &str, labels: &Tags, quantile: Option<f64>, value: f64) {
    let mut rendered = render_labels(labels);
    if let Some(q) = quantile {
        if !rendered.is_empty() {
            rendered.push(',');
        }
        let _ = write!(rendered, "quantile=\"{}\"", q);
    }

    if rendered.is_empty() {
        let _ = writeln!(out, "{} {}", name, value);
    } else {
        let _ = writeln!(out, "{}{{{}}} {}", name, rendered, value);
    }
}

/// Map a free-form metric name onto `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn sanitize_metric_name(name: &str) -> String {
    sanitize(name, true)
}

fn sanitize_tags(tags: &Tags) -> Tags {
    tags.iter()
        .map(|(k, v)| (sanitize(k, false), v.clone()))
        .collect()
}

fn sanitize(raw: &str, allow_colon: bool) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || (allow_colon && c == ':') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRegistry;

    #[test]
    fn test_sanitize_metric_name() {
        assert_eq!(sanitize_metric_name("cognitive.latency-ms"), "cognitive_latency_ms");
        assert_eq!(sanitize_metric_name("ns:requests"), "ns:requests");
        assert_eq!(sanitize_metric_name("9lives"), "_9lives");
    }

    #[test]
    fn test_prometheus_counters_and_gauges() {
        let registry = MetricRegistry::default();
        let mut tags = Tags::new();
        tags.insert("agent".to_string(), "planner".to_string());
        registry.increment("errors", 6.0, None).unwrap();
        registry.increment("errors", 2.0, Some(&tags)).unwrap();
        registry.set_gauge("queue.depth", 4.5, None).unwrap();

        let text = to_prometheus(&registry.snapshot());

        assert!(text.contains("# TYPE errors counter\n"));
        assert!(text.contains("\nerrors 6\n"));
        assert!(text.contains("errors{agent=\"planner\"} 2\n"));
        assert!(text.contains("# TYPE queue_depth gauge\nqueue_depth 4.5\n"));
    }

    #[test]
    fn test_prometheus_single_type_line_per_family() {
        // Given: one untagged and two tagged variants of the same counter
        let registry = MetricRegistry::default();
        registry.increment("errors", 1.0, None).unwrap();
        for agent in ["planner", "critic"] {
            let mut tags = Tags::new();
            tags.insert("agent".to_string(), agent.to_string());
            registry.increment("errors", 1.0, Some(&tags)).unwrap();
        }
        registry.set_gauge("errors_rate", 0.5, None).unwrap();

        // When
        let text = to_prometheus(&registry.snapshot());

        // Then: all three samples sit under a single # TYPE line
        assert_eq!(text.matches("# TYPE errors counter\n").count(), 1);
        let family = text.split("# TYPE errors counter\n").nth(1).unwrap();
        let samples: Vec<&str> = family.lines().take_while(|l| !l.starts_with('#')).collect();
        assert_eq!(samples.len(), 3);
        assert!(samples.contains(&"errors{agent=\"critic\"} 1"));
        assert!(text.contains("# TYPE errors_rate gauge\n"));
    }

    #[test]
    fn test_prometheus_histogram_as_summary() {
        let registry = MetricRegistry::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            registry.observe("latency_ms", v, None).unwrap();
        }

        let text = to_prometheus(&registry.snapshot());

        assert!(text.contains("# TYPE latency_ms summary\n"));
        assert!(text.contains("latency_ms{quantile=\"0.5\"} 3\n"));
        assert!(text.contains("latency_ms{quantile=\"0.99\"} 5\n"));
        assert!(text.contains("latency_ms_sum 15\n"));
        assert!(text.contains("latency_ms_count 5\n"));
    }

    #[test]
    fn test_json_export_parses_back() {
        let registry = MetricRegistry::default();
        registry.increment("errors", 1.0, None).unwrap();
        registry.observe("latency_ms", 12.0, None).unwrap();

        let json = to_json(&registry.snapshot()).unwrap();
        let parsed: MetricsSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.counter("errors"), Some(1.0));
        assert_eq!(parsed.histogram("latency_ms"), Some(&[12.0][..]));
        assert_eq!(parsed.aggregations["errors"].metric_type, MetricType::Counter);
    }
}
