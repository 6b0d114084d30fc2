//! The gateway HTTP server.
//!
//! ```text
//! Client ──► Gateway ──► resolve ──► (strict body check) ──► ProxyClient ──► Service
//!               │                                                              │
//!               └──────────── relay status, headers, body ◄────────────────────┘
//! ```
//!
//! Every request, failed or not, is answered with `x-trace-id` and produces
//! one `gateway_request` event. The upstream body is streamed through, so
//! the event and the proxy span close once the upstream head has arrived.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::HeaderValue;
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::json;
use switchyard_config::RuntimeConfig;
use switchyard_core::{error_response, json_response, Contract, MeshError, MeshResult};
use switchyard_extract::decode_json;
use switchyard_telemetry::{in_span, SharedSink, TraceContext, TraceOrigin, TRACE_ID_HEADER};
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};

use crate::error::GatewayResult;
use crate::headers::{sanitize, set_trace_id};
use crate::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
use crate::routes::GatewayTable;

/// Response body of the gateway: either a locally built payload or the
/// upstream body as it streams in.
pub type GatewayBody = UnsyncBoxBody<Bytes, reqwest::Error>;

/// Response type of the gateway.
pub type HttpResponse = Response<GatewayBody>;

fn full(bytes: Bytes) -> GatewayBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

/// Query strings are forwarded for these methods.
fn forwards_query(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

/// Bodies are forwarded for these methods.
fn forwards_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// The edge gateway.
pub struct Gateway {
    table: GatewayTable,
    proxy: ProxyClient,
    sink: SharedSink,
    strict_validation: bool,
    max_body_bytes: usize,
}

impl Gateway {
    /// Compiles the contract's routes and builds the upstream client.
    ///
    /// # Errors
    ///
    /// Fails on a route conflict or if the HTTP client cannot be built.
    pub fn new(contract: &Contract, config: &RuntimeConfig, sink: SharedSink) -> GatewayResult<Self> {
        let table = GatewayTable::compile(contract, sink.as_ref())?;
        let proxy = ProxyClient::new(&config.upstream)?;

        Ok(Self {
            table,
            proxy,
            sink,
            strict_validation: config.contract.strict_validation,
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    /// Turns request-schema enforcement at the edge on or off.
    #[must_use]
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// The compiled route table.
    #[must_use]
    pub fn table(&self) -> &GatewayTable {
        &self.table
    }

    /// Handles one request whose body has already been read.
    pub async fn handle(&self, request: Request<Bytes>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let body = if body.len() > self.max_body_bytes {
            Err(MeshError::PayloadTooLarge {
                limit: self.max_body_bytes,
            })
        } else {
            Ok(body)
        };
        self.respond(parts, body).await
    }

    async fn handle_incoming(&self, request: Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.is::<http_body_util::LengthLimitError>() => Err(MeshError::PayloadTooLarge {
                limit: self.max_body_bytes,
            }),
            Err(err) => Err(MeshError::validation(format!("failed to read request body: {err}"))),
        };
        self.respond(parts, body).await
    }

    async fn respond(&self, parts: Parts, body: MeshResult<Bytes>) -> HttpResponse {
        if parts.method == Method::GET && parts.uri.path() == "/healthz" {
            return json_response(StatusCode::OK, &json!({"status": "ok"})).map(full);
        }

        let started = Instant::now();
        let inbound = parts
            .headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let context = TraceContext::start(inbound, TraceOrigin::Gateway, Arc::clone(&self.sink));

        let log_span = context.log_span().clone();

        async move {
            let result = match body {
                Ok(body) => {
                    context
                        .clone()
                        .scope(self.forward(&parts, body, context.trace_id()))
                        .await
                }
                Err(err) => Err(err),
            };

            let mut response = match result {
                Ok(upstream) => relay(upstream),
                Err(err) => {
                    if err.status_code().is_server_error() {
                        error!(trace_id = %context.trace_id(), error = %err, "proxy failed");
                    } else {
                        debug!(trace_id = %context.trace_id(), error = %err, "request rejected");
                    }
                    error_response(&err, Some(context.trace_id())).map(full)
                }
            };

            if let Ok(value) = HeaderValue::from_str(context.trace_id()) {
                response.headers_mut().insert(TRACE_ID_HEADER, value);
            }

            context.emit(
                "gateway_request",
                json!({
                    "method": parts.method.as_str(),
                    "path": parts.uri.path(),
                    "status": response.status().as_u16(),
                    "duration_ms": round_ms(started),
                }),
            );

            response
        }
        .instrument(log_span)
        .await
    }

    async fn forward(&self, parts: &Parts, body: Bytes, trace_id: &str) -> MeshResult<ProxyResponse> {
        let (target, params) = self.table.resolve(&parts.method, parts.uri.path())?;
        let route = target.route();

        if self.strict_validation && forwards_body(&parts.method) {
            if let Some(schema) = &route.request_schema {
                decode_json(&parts.headers, &body, Some(schema))?;
            }
        }

        let query = if forwards_query(&parts.method) {
            parts.uri.query()
        } else {
            None
        };
        let url = target.upstream_url(&params, query)?;

        let mut headers = sanitize(&parts.headers);
        set_trace_id(&mut headers, trace_id);

        let request = ProxyRequest {
            method: parts.method.clone(),
            url,
            headers,
            body: forwards_body(&parts.method).then_some(body),
            service: target.service().to_string(),
        };

        debug!(
            service = %target.service(),
            route = %route.label(),
            url = %request.url,
            "forwarding request"
        );

        in_span(&target.span_name(), self.proxy.forward(request)).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's address cannot be read.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> GatewayResult<()>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        info!(routes = self.table.len(), "gateway listening on {}", addr);

        let gateway = Arc::new(self);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let gateway = Arc::clone(&gateway);
                            tokio::spawn(async move {
                                gateway.serve_connection(stream, peer).await;
                            });
                        }
                        Err(e) => error!("failed to accept connection: {}", e),
                    }
                }
                () = &mut shutdown => {
                    info!("shutdown signal received, stopping gateway");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn serve_connection(self: Arc<Self>, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req: Request<Incoming>| {
            let gateway = Arc::clone(&self);
            async move { Ok::<_, Infallible>(gateway.handle_incoming(req).await) }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            debug!("connection error from {}: {}", peer, e);
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("routes", &self.table.len())
            .field("strict_validation", &self.strict_validation)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

fn relay(upstream: ProxyResponse) -> HttpResponse {
    let mut response = Response::new(upstream.body);
    *response.status_mut() = upstream.status;
    *response.headers_mut() = sanitize(&upstream.headers);
    response
}

fn round_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use http::HeaderMap;

    #[test]
    fn test_method_forwarding_rules() {
        assert!(forwards_query(&Method::GET));
        assert!(forwards_query(&Method::HEAD));
        assert!(!forwards_query(&Method::POST));

        assert!(forwards_body(&Method::PATCH));
        assert!(!forwards_body(&Method::GET));
        assert!(!forwards_body(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_relay_drops_framing() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "2".parse().unwrap());
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());

        let response = relay(ProxyResponse {
            status: StatusCode::CREATED,
            headers,
            body: full(Bytes::from_static(b"{}")),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(!response.headers().contains_key(CONTENT_LENGTH));
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"{}");
    }
}
