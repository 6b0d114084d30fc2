//! Structured trace events and the sinks that receive them.
//!
//! Every event is one flat JSON record:
//!
//! ```text
//! {"ts":"2026-01-05T10:22:31.120Z","trace_id":"abc-123","event":"span_end_get_recipe","name":"get_recipe","duration_ms":3.41}
//! ```

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing_subscriber::fmt::MakeWriter;

/// One structured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredEvent {
    /// Emission time.
    pub ts: DateTime<Utc>,
    /// Trace id, absent for events outside a request (startup).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Event name.
    pub event: String,
    /// Event-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StructuredEvent {
    /// Builds an event stamped with the current time.
    ///
    /// `fields` is expected to be a JSON object; any other value is stored
    /// under a `value` key.
    #[must_use]
    pub fn new(trace_id: Option<&str>, event: impl Into<String>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            ts: Utc::now(),
            trace_id: trace_id.map(ToString::to_string),
            event: event.into(),
            fields,
        }
    }

    /// Reads a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Serializes the event as one line of JSON.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"event":"{}","serialization_error":"{}"}}"#,
                self.event,
                e.to_string().replace('"', "'")
            )
        })
    }
}

/// Receives structured events.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &StructuredEvent);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Writes each event as one JSON line.
///
/// The writer is a [`MakeWriter`], the same abstraction the log formatter
/// uses, so events and diagnostic logs can share stdout or a test buffer.
pub struct JsonLineSink<W = fn() -> io::Stdout> {
    make_writer: W,
}

impl JsonLineSink {
    /// A sink writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self {
            make_writer: io::stdout,
        }
    }

    /// Shared stdout sink.
    #[must_use]
    pub fn shared() -> SharedSink {
        Arc::new(Self::stdout())
    }
}

impl<W> JsonLineSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    /// A sink writing through `make_writer`.
    pub fn new(make_writer: W) -> Self {
        Self { make_writer }
    }
}

impl<W> fmt::Debug for JsonLineSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLineSink").finish_non_exhaustive()
    }
}

impl<W> EventSink for JsonLineSink<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fn record(&self, event: &StructuredEvent) {
        let mut line = event.to_json_line();
        line.push('\n');
        // One write per record keeps lines whole when the writer is shared.
        let _ = self.make_writer.make_writer().write_all(line.as_bytes());
    }
}

/// Keeps events in memory. Used by tests across the workspace.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<StructuredEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<StructuredEvent> {
        self.events.lock().clone()
    }

    /// Recorded event names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Events with the given name.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<StructuredEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event == name)
            .cloned()
            .collect()
    }

    /// Drops everything recorded so far.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &StructuredEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Emits an event that belongs to no request, such as a startup record.
pub fn emit_detached(sink: &dyn EventSink, event: &str, fields: Value) {
    sink.record(&StructuredEvent::new(None, event, fields));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_flattens_fields() {
        let event = StructuredEvent::new(
            Some("abc-123"),
            "gateway_request",
            json!({"method": "GET", "status": 200}),
        );
        let line: Value = serde_json::from_str(&event.to_json_line()).unwrap();
        assert_eq!(line["trace_id"], "abc-123");
        assert_eq!(line["event"], "gateway_request");
        assert_eq!(line["status"], 200);
        assert!(line["ts"].is_string());
    }

    #[test]
    fn test_detached_event_has_no_trace_id() {
        let sink = MemorySink::new();
        emit_detached(sink.as_ref(), "startup", json!({"action": "route_registration"}));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].trace_id.is_none());
        assert!(!events[0].to_json_line().contains("trace_id"));
    }

    #[test]
    fn test_non_object_fields() {
        let event = StructuredEvent::new(None, "note", json!(5));
        assert_eq!(event.field("value"), Some(&json!(5)));
        assert!(StructuredEvent::new(None, "note", Value::Null).fields.is_empty());
    }

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_line_sink_writes_flat_records() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let sink = JsonLineSink::new(move || writer.clone());

        sink.record(&StructuredEvent::new(
            Some("abc-123"),
            "request",
            json!({"method": "GET", "status": 404}),
        ));
        emit_detached(&sink, "startup", json!({"action": "route_registration"}));

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["trace_id"], "abc-123");
        assert_eq!(lines[0]["event"], "request");
        assert_eq!(lines[0]["status"], 404);
        assert!(lines[0]["ts"].is_string());
        assert_eq!(lines[1]["event"], "startup");
        assert!(lines[1].get("trace_id").is_none());
    }

    #[test]
    fn test_memory_sink_filters() {
        let sink = MemorySink::new();
        emit_detached(sink.as_ref(), "a", Value::Null);
        emit_detached(sink.as_ref(), "b", Value::Null);
        emit_detached(sink.as_ref(), "a", Value::Null);

        assert_eq!(sink.names(), vec!["a", "b", "a"]);
        assert_eq!(sink.named("a").len(), 2);
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
