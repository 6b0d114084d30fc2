//! JSON responses shared by the gateway and the service runtime.

use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Response, StatusCode};
use serde::Serialize;

use crate::error::MeshError;

/// Content type of every response the runtimes produce themselves.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Serializes `body` into a JSON response.
///
/// A body that fails to serialize becomes a 500 with an empty object.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Bytes> {
    let (status, payload) = match serde_json::to_vec(body) {
        Ok(payload) => (status, payload),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, b"{}".to_vec()),
    };

    let mut response = Response::new(Bytes::from(payload));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Renders `error` as an envelope response.
///
/// 405 responses carry an `allow` header listing the accepted methods.
pub fn error_response(error: &MeshError, trace_id: Option<&str>) -> Response<Bytes> {
    let mut response = json_response(error.status_code(), &error.to_envelope(trace_id));

    if let Some(allowed) = error.allowed_methods() {
        let list = allowed
            .iter()
            .map(http::Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&list) {
            response.headers_mut().insert(ALLOW, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_json_response() {
        let response = json_response(StatusCode::CREATED, &serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(response.body().as_ref(), br#"{"id":1}"#);
    }

    #[test]
    fn test_error_response_envelope() {
        let error = MeshError::not_found("no route for /nowhere");
        let response = error_response(&error, Some("abc-123"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["category"], "not_found");
        assert_eq!(body["trace_id"], "abc-123");
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let error = MeshError::method_not_allowed(Method::DELETE, vec![Method::GET, Method::POST]);
        let response = error_response(&error, None);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST");
    }
}
