//! Log output of a proxied request: every line written while the request
//! runs, diagnostic or structured, is attributable to its trace id.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use switchyard_config::RuntimeConfig;
use switchyard_core::{Contract, DocumentFormat, SchemaRegistry};
use switchyard_gateway::Gateway;
use switchyard_telemetry::{create_env_filter, json_subscriber, JsonLineSink, TRACE_ID_HEADER};
use tokio::net::TcpListener;

const CONTRACT: &str = r"
urlPrefix: /api/v1
title: Kitchen
version: '1.0'
services:
  recipes:
    title: Recipes
    version: '1.0'
    url: UPSTREAM
    routes:
      - { method: GET, path: '/recipes/{id}', handler: recipes.get }
";

/// Shared stdout stand-in for both the log formatter and the event sink.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<Value> {
        let output = String::from_utf8(self.0.lock().clone()).unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn trace_id_of(line: &Value) -> Option<&str> {
    line.get("trace_id")
        .or_else(|| line.pointer("/span/trace_id"))
        .and_then(Value::as_str)
}

#[tokio::test]
async fn every_line_of_a_request_carries_its_trace_id() {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = json_subscriber(
        create_env_filter("switchyard_gateway=debug,switchyard_telemetry=debug").unwrap(),
        true,
        move || writer.clone(),
    );
    let _default = tracing::subscriber::set_default(subscriber);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let document = CONTRACT.replace("UPSTREAM", &format!("http://{addr}"));
    let contract = Contract::parse(&document, DocumentFormat::Yaml, &SchemaRegistry::new()).unwrap();
    let writer = captured.clone();
    let sink = Arc::new(JsonLineSink::new(move || writer.clone()));
    let gateway = Gateway::new(&contract, &RuntimeConfig::default(), sink).unwrap();
    captured.clear();

    let request = Request::builder()
        .uri("/api/v1/recipes/123")
        .header(TRACE_ID_HEADER, "abc-123")
        .body(Bytes::new())
        .unwrap();
    let response = gateway.handle(request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let lines = captured.lines();
    assert!(!lines.is_empty());
    for line in &lines {
        assert_eq!(trace_id_of(line), Some("abc-123"), "line without trace id: {line}");
    }

    assert!(lines.iter().any(|l| l["message"] == "forwarding request"));
    assert!(lines.iter().any(|l| l["message"] == "upstream call failed"));

    let record = lines
        .iter()
        .find(|l| l["event"] == "gateway_request")
        .expect("gateway_request record");
    assert_eq!(record["trace_id"], "abc-123");
    assert_eq!(record["status"], 502);
    assert!(record["ts"].is_string());
    assert!(record.get("fields").is_none());
}
