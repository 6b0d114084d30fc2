//! HTTP proxy client for forwarding requests to upstream services.

use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::{HeaderMap, Method, StatusCode};
use hyper::body::Frame;
use http_body_util::{BodyExt, StreamBody};
use reqwest::Client;
use switchyard_config::UpstreamConfig;
use switchyard_core::{MeshError, MeshResult};

use crate::error::{GatewayError, GatewayResult};
use crate::server::GatewayBody;

/// Request to be forwarded upstream.
#[derive(Debug)]
pub struct ProxyRequest {
    /// HTTP method, forwarded unchanged.
    pub method: Method,
    /// Full upstream URL including any query string.
    pub url: String,
    /// Already sanitized headers.
    pub headers: HeaderMap,
    /// Body for body-bearing methods.
    pub body: Option<Bytes>,
    /// Service name, reported in upstream errors.
    pub service: String,
}

/// Response from upstream.
#[derive(Debug)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers as received.
    pub headers: HeaderMap,
    /// Response body, still streaming from upstream.
    pub body: GatewayBody,
}

/// HTTP client with a bounded timeout on every call.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    timeout: Duration,
}

impl ProxyClient {
    /// Create a new proxy client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn new(config: &UpstreamConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::client(format!("failed to create client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// The per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward a request to the upstream service.
    ///
    /// No retries: a transport failure is reported as 502, a timeout as 504.
    /// Returns once the upstream head arrives; the body is relayed as it
    /// streams and stays under the same timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Upstream`] or [`MeshError::Timeout`].
    pub async fn forward(&self, request: ProxyRequest) -> MeshResult<ProxyResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(self.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let service = request.service;
        let response = builder
            .send()
            .await
            .map_err(|e| upstream_error(&e, &service))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = StreamBody::new(response.bytes_stream().map_ok(Frame::data)).boxed_unsync();

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

fn upstream_error(err: &reqwest::Error, service: &str) -> MeshError {
    if err.is_timeout() {
        tracing::warn!(service, error = %err, "upstream call timed out");
        MeshError::timeout(format!("upstream '{service}' timed out"), Some(service))
    } else {
        tracing::warn!(service, error = %err, "upstream call failed");
        MeshError::upstream(format!("upstream '{service}' unreachable: {err}"), Some(service))
    }
}
