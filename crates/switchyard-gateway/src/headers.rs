//! Header sanitization for forwarded requests and relayed responses.

use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use switchyard_telemetry::TRACE_ID_HEADER;

/// Connection-specific headers that are never copied between connections.
pub const FRAMING_HEADERS: [HeaderName; 4] = [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION];

/// Check if a header belongs to the inbound connection's framing.
#[must_use]
pub fn is_framing_header(name: &HeaderName) -> bool {
    FRAMING_HEADERS.contains(name)
}

/// Copies every header except the framing headers.
#[must_use]
pub fn sanitize(headers: &HeaderMap) -> HeaderMap {
    let mut clean = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_framing_header(name) {
            clean.append(name.clone(), value.clone());
        }
    }
    clean
}

/// Sets the trace header, replacing any existing value.
pub fn set_trace_id(headers: &mut HeaderMap, trace_id: &str) {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        headers.insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }
}

/// Reads the trace header.
#[must_use]
pub fn trace_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(TRACE_ID_HEADER).and_then(|v| v.to_str().ok())
}
