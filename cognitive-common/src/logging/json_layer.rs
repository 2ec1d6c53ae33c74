//! Line-delimited JSON output.
//!
//! Each event carries the observability component that emitted it
//! (`metrics`, `alerting`, `recording`, ...), taken from the second segment
//! of the event target.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Local, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

static SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize)]
pub struct JsonLogEvent {
    pub ts: String,
    pub level: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// `file:line` when location output is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Process-wide emission order
    pub seq: u64,
}

/// `cognitive_core::alerting::engine` -> `alerting`
fn component_of(target: &str) -> Option<String> {
    match target.split("::").collect::<Vec<_>>().as_slice() {
        ["cognitive_core" | "cognitive_common", component, ..] => Some(component.to_string()),
        _ => None,
    }
}

/// Writes one [`JsonLogEvent`] per line to `W`.
pub struct JsonLayer<W> {
    writer: W,
    app: Option<String>,
    location: bool,
    utc: bool,
}

impl<W> JsonLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    /// UTC timestamps, no location, no app name
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            app: None,
            location: false,
            utc: true,
        }
    }

    pub fn with_app(mut self, app: Option<String>) -> Self {
        self.app = app;
        self
    }

    pub fn with_location(mut self, on: bool) -> Self {
        self.location = on;
        self
    }

    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    fn timestamp(&self) -> String {
        if self.utc {
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        } else {
            Local::now().to_rfc3339_opts(SecondsFormat::Millis, false)
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let location = match (self.location, meta.file(), meta.line()) {
            (true, Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
            _ => None,
        };

        let record = JsonLogEvent {
            ts: self.timestamp(),
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            component: component_of(meta.target()),
            message: fields.message.unwrap_or_default(),
            fields: fields.values,
            location,
            app: self.app.clone(),
            seq: SEQ.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(line) = serde_json::to_string(&record) {
            let _ = writeln!(self.writer.make_writer(), "{}", line);
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Map<String, Value>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.values.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        // NaN and infinities have no JSON number form
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn records(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_component_from_target() {
        assert_eq!(
            component_of("cognitive_core::recording::replay").as_deref(),
            Some("recording")
        );
        assert_eq!(component_of("cognitive_core"), None);
        assert_eq!(component_of("tokio::runtime"), None);
    }

    #[test]
    fn test_event_fields_are_typed() {
        let out = Captured::default();
        let layer = JsonLayer::new(out.clone()).with_app(Some("monitor".to_string()));
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(rule_id = "errors", current_value = 6.0, acknowledged = false, "Alert opened");
        });

        let records = out.records();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r["level"], "WARN");
        assert_eq!(r["message"], "Alert opened");
        assert_eq!(r["app"], "monitor");
        assert_eq!(r["fields"]["rule_id"], "errors");
        assert_eq!(r["fields"]["current_value"], 6.0);
        assert_eq!(r["fields"]["acknowledged"], false);
        assert!(r.get("location").is_none());
    }

    #[test]
    fn test_location_when_enabled() {
        let out = Captured::default();
        let subscriber =
            tracing_subscriber::registry().with(JsonLayer::new(out.clone()).with_location(true));

        tracing::subscriber::with_default(subscriber, || tracing::info!("tick"));

        let records = out.records();
        let location = records[0]["location"].as_str().unwrap();
        assert!(location.contains("json_layer.rs:"));
    }
}
