//! JSON request bodies.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use switchyard_core::BoundSchema;

use crate::error::{ExtractionError, ExtractionSource};

const JSON: &str = "application/json";

/// Returns true if the content type denotes JSON (`application/json` or a
/// `+json` suffix type).
#[must_use]
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == JSON || essence.ends_with("+json")
}

/// Decodes a JSON body and validates it against `schema`.
///
/// A missing `content-type` is accepted; any other non-JSON type is
/// rejected with 415. An empty body is a 400, malformed JSON is a 400 and a
/// schema violation is a 422 naming the offending JSON path.
pub fn decode_json(
    headers: &HeaderMap,
    body: &Bytes,
    schema: Option<&BoundSchema>,
) -> Result<Value, ExtractionError> {
    if headers.contains_key(CONTENT_TYPE) && !is_json_content_type(headers) {
        let actual = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        return Err(ExtractionError::unsupported_media_type(JSON, actual));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ExtractionError::missing(ExtractionSource::Body, "body"));
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ExtractionError::deserialization_failed(ExtractionSource::Body, e.to_string())
    })?;

    if let Some(schema) = schema {
        schema.validate(&value).map_err(|e| {
            ExtractionError::validation_failed(ExtractionSource::Body, e.path, e.message)
        })?;
    }

    Ok(value)
}

/// Converts an already-validated body into a typed value.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ExtractionError> {
    serde_json::from_value(value)
        .map_err(|e| ExtractionError::deserialization_failed(ExtractionSource::Body, e.to_string()))
}
