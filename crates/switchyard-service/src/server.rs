//! HTTP runtime for a backend service.
//!
//! Every request gets its own [`TraceContext`] (adopting `x-trace-id` or
//! synthesizing a `LOCAL-` id), runs through the [`LocalDispatcher`] inside
//! that context, and is answered with the trace header set, errors
//! included. One `request` event is emitted per request.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::HeaderValue;
use http::request::Parts;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::json;
use switchyard_core::{error_response, json_response, MeshError, MeshResult};
use switchyard_telemetry::{SharedSink, TraceContext, TraceOrigin, TRACE_ID_HEADER};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};

use crate::dispatch::{LocalDispatcher, RequestParts};

/// Default request body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Response body type of the runtime.
pub type HttpResponse = Response<Full<Bytes>>;

/// Errors from serving.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Binding or accepting failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A backend service ready to serve its compiled routes.
pub struct ServiceRuntime {
    dispatcher: LocalDispatcher,
    sink: SharedSink,
    max_body_bytes: usize,
}

impl ServiceRuntime {
    /// Creates a runtime around a compiled dispatcher.
    #[must_use]
    pub fn new(dispatcher: LocalDispatcher, sink: SharedSink) -> Self {
        Self {
            dispatcher,
            sink,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the request body limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// The compiled routes.
    #[must_use]
    pub fn dispatcher(&self) -> &LocalDispatcher {
        &self.dispatcher
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
            return json_response(StatusCode::OK, &json!({"status": "ok"})).map(Full::new);
        }

        let started = Instant::now();
        let inbound = parts
            .headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        let context = TraceContext::start(inbound, TraceOrigin::Local, Arc::clone(&self.sink));

        let log_span = context.log_span().clone();

        async move {
            let path = parts.uri.path().to_string();
            let result = match body {
                Ok(body) => {
                    let request = RequestParts {
                        headers: &parts.headers,
                        query: parts.uri.query(),
                        body: &body,
                    };
                    context
                        .clone()
                        .scope(self.dispatcher.dispatch(&parts.method, &path, request))
                        .await
                }
                Err(err) => Err(err),
            };

            let mut response = match result {
                Ok(output) => json_response(output.status, &output.body),
                Err(err) => {
                    if err.status_code().is_server_error() {
                        error!(trace_id = %context.trace_id(), error = %err, "request failed");
                    } else {
                        debug!(trace_id = %context.trace_id(), error = %err, "request rejected");
                    }
                    error_response(&err, Some(context.trace_id()))
                }
            };

            if let Ok(value) = HeaderValue::from_str(context.trace_id()) {
                response.headers_mut().insert(TRACE_ID_HEADER, value);
            }

            context.emit(
                "request",
                json!({
                    "method": parts.method.as_str(),
                    "path": path,
                    "status": response.status().as_u16(),
                    "duration_ms": round_ms(started),
                }),
            );

            response.map(Full::new)
        }
        .instrument(log_span)
        .await
    }

    /// Serves on `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's address cannot be read.
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> Result<(), ServiceError>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = listener.local_addr()?;
        info!(
            service = %self.dispatcher.service(),
            routes = self.dispatcher.len(),
            "service listening on {}",
            addr
        );

        let runtime = Arc::new(self);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let runtime = Arc::clone(&runtime);
                            tokio::spawn(async move {
                                runtime.serve_connection(stream, peer).await;
                            });
                        }
                        Err(e) => error!("failed to accept connection: {}", e),
                    }
                }
                () = &mut shutdown => {
                    info!("shutdown signal received, stopping service");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn serve_connection(self: Arc<Self>, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let io = TokioIo::new(stream);
        let service = service_fn(move |req: Request<Incoming>| {
            let runtime = Arc::clone(&self);
            async move { Ok::<_, Infallible>(runtime.handle_incoming(req).await) }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            debug!("connection error from {}: {}", peer, e);
        }
    }
}

impl std::fmt::Debug for ServiceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

fn round_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0
}
