//! Local dispatch compiler.
//!
//! [`LocalDispatcher::compile`] turns the routes of one contract service into
//! [`DispatchUnit`]s stored in a radix router. Every handler reference is
//! resolved at compile time; a missing handler, or a database-backed service
//! started without a persistence layer, is a [`ContractError`].
//!
//! At request time a unit runs, inside a span named after its handler:
//!
//! ```text
//! 1. decode + validate body    (request schema only)  -> 400/415/422
//! 2. path parameters           (template order)
//! 3. acquire persistence       (service db only)      -> 503
//! 4. extract query options     (no request schema)    -> 400/422
//! 5. call handler              args = [path.., body?, handle?], options
//! 6. await reply if pending, release handle
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::json;
use switchyard_core::{
    Contract, ContractError, ContractResult, MeshError, MeshResult, Route, Service,
};
use switchyard_extract::{decode_json, QueryExtractor, QueryOptions};
use switchyard_router::{Lookup, PathParams, Router};
use switchyard_telemetry::{emit_current, emit_detached, in_span, EventSink};

use crate::handler::{Argument, HandlerFn, HandlerOutput, HandlerRegistry, Invocation};
use crate::persistence::{Lease, Persistence};

/// Inbound request data a dispatch unit needs.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Raw query string, without the `?`.
    pub query: Option<&'a str>,
    /// Request body.
    pub body: &'a Bytes,
}

/// The compiled, callable form of one route.
pub struct DispatchUnit {
    route: Route,
    handler: HandlerFn,
    extractor: QueryExtractor,
    persistence: Option<Arc<dyn Persistence>>,
}

impl DispatchUnit {
    /// The route this unit was compiled from.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Binds the request and calls the handler.
    ///
    /// # Errors
    ///
    /// Returns client errors from body or query extraction, a persistence
    /// error if no handle can be acquired, or whatever the handler raises.
    pub async fn invoke(
        &self,
        params: &PathParams,
        request: RequestParts<'_>,
    ) -> MeshResult<HandlerOutput> {
        in_span(&self.route.handler, self.run(params, request)).await
    }

    async fn run(&self, params: &PathParams, request: RequestParts<'_>) -> MeshResult<HandlerOutput> {
        let body = match &self.route.request_schema {
            Some(schema) => Some(decode_json(request.headers, request.body, Some(schema))?),
            None => None,
        };

        let mut args = params
            .iter()
            .map(|(name, value)| {
                Ok(Argument::Path {
                    name: name.to_string(),
                    value: decode_segment(name, value)?,
                })
            })
            .collect::<MeshResult<Vec<_>>>()?;

        let lease = match &self.persistence {
            Some(persistence) => Some(Lease::acquire(persistence).await?),
            None => None,
        };

        let options = if self.route.request_schema.is_none() {
            self.extractor.extract(request.query)?
        } else {
            QueryOptions::empty()
        };

        if let Some(body) = body {
            args.push(Argument::Body(body));
        }
        if let Some(handle) = lease.as_ref().and_then(Lease::handle) {
            args.push(Argument::Handle(handle));
        }

        let output = (self.handler)(Invocation::new(args, options)).resolve().await;
        drop(lease);

        let output = output?;
        self.check_response(&output);
        Ok(output)
    }

    fn check_response(&self, output: &HandlerOutput) {
        let Some(schema) = &self.route.response_schema else {
            return;
        };
        if !output.status.is_success() {
            return;
        }
        if let Err(err) = schema.validate(&output.body) {
            tracing::warn!(
                handler = %self.route.handler,
                schema = %schema.reference(),
                error = %err,
                "handler response does not match its schema"
            );
            emit_current(
                "response_schema_mismatch",
                json!({
                    "handler": self.route.handler,
                    "path": self.route.path.as_str(),
                    "schema": schema.reference().to_string(),
                    "field": err.path,
                    "message": err.message,
                }),
            );
        }
    }
}

impl fmt::Debug for DispatchUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchUnit")
            .field("route", &self.route.label())
            .field("handler", &self.route.handler)
            .field("persistence", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

/// Route table of one backend service.
#[derive(Debug)]
pub struct LocalDispatcher {
    service: String,
    router: Router<DispatchUnit>,
}

impl LocalDispatcher {
    /// Compiles the routes of `service_name`.
    ///
    /// Emits one `startup` event per registered route.
    ///
    /// # Errors
    ///
    /// Fails if the service is unknown, a handler reference is not in
    /// `handlers`, the service declares a database but `persistence` is
    /// `None`, or two routes collide in the router.
    pub fn compile(
        contract: &Contract,
        service_name: &str,
        handlers: &HandlerRegistry,
        persistence: Option<Arc<dyn Persistence>>,
        sink: &dyn EventSink,
    ) -> ContractResult<Self> {
        let service = contract.service(service_name)?;

        let persistence = if service.has_persistence() {
            Some(persistence.ok_or_else(|| ContractError::MissingPersistence {
                service: service.name.clone(),
            })?)
        } else {
            None
        };

        let mut router = Router::new();
        for route in &service.routes {
            let unit = compile_unit(service, route, handlers, persistence.clone())?;
            router
                .insert(route.method.clone(), route.path.as_str(), unit)
                .map_err(|conflict| ContractError::InvalidRoute {
                    service: service.name.clone(),
                    route: route.label(),
                    reason: conflict.message().to_string(),
                })?;

            tracing::info!(
                service = %service.name,
                method = %route.method,
                path = %route.path,
                handler = %route.handler,
                "registered route"
            );
            emit_detached(
                sink,
                "startup",
                json!({
                    "action": "route_registration",
                    "service_name": service.name,
                    "method": route.method.as_str(),
                    "path": route.path.as_str(),
                    "handler": route.handler,
                }),
            );
        }

        Ok(Self {
            service: service.name.clone(),
            router,
        })
    }

    /// Name of the service this table serves.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Number of compiled routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// Returns true if the service has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }

    /// Resolves `method` and `path` and invokes the matching unit.
    ///
    /// # Errors
    ///
    /// 404 for an unknown path, 405 for a known path with another method,
    /// otherwise whatever [`DispatchUnit::invoke`] returns.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        request: RequestParts<'_>,
    ) -> MeshResult<HandlerOutput> {
        match self.router.lookup(method, path) {
            Lookup::Found(found) => found.value.invoke(&found.params, request).await,
            Lookup::MethodNotAllowed(allowed) => {
                Err(MeshError::method_not_allowed(method.clone(), allowed))
            }
            Lookup::NotFound => Err(MeshError::not_found(format!("no route for {path}"))),
        }
    }
}

fn compile_unit(
    service: &Service,
    route: &Route,
    handlers: &HandlerRegistry,
    persistence: Option<Arc<dyn Persistence>>,
) -> ContractResult<DispatchUnit> {
    let handler = handlers
        .get(&route.handler)
        .ok_or_else(|| ContractError::UnresolvedHandler {
            service: service.name.clone(),
            route: route.label(),
            handler: route.handler.clone(),
        })?;

    Ok(DispatchUnit {
        route: route.clone(),
        handler,
        extractor: QueryExtractor::for_route(route),
        persistence,
    })
}

/// Percent-decodes a captured path segment. The router keeps raw segments.
fn decode_segment(name: &str, raw: &str) -> MeshResult<String> {
    urlencoding::decode(raw)
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| MeshError::validation(format!("path parameter '{name}' is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{DocumentFormat, SchemaRegistry};
    use switchyard_telemetry::MemorySink;

    const CONTRACT: &str = r"
urlPrefix: /api/v1
title: Kitchen
version: '1.0'
services:
  pantry:
    title: Pantry
    version: '1.0'
    url: http://pantry:8002
    routes:
      - method: GET
        path: /shelves/{shelf}
        handler: pantry.get_shelf
      - method: DELETE
        path: /shelves/{shelf}
        handler: pantry.clear_shelf
";

    fn contract() -> Contract {
        Contract::parse(CONTRACT, DocumentFormat::Yaml, &SchemaRegistry::new()).unwrap()
    }

    fn handlers() -> HandlerRegistry {
        let mut handlers = HandlerRegistry::new();
        handlers.register_sync("pantry.get_shelf", |call| {
            Ok(json!({ "shelf": call.path(0) }).into())
        });
        handlers.register_sync("pantry.clear_shelf", |_| Ok(json!(null).into()));
        handlers
    }

    fn parts<'a>(headers: &'a HeaderMap, body: &'a Bytes) -> RequestParts<'a> {
        RequestParts {
            headers,
            query: None,
            body,
        }
    }

    #[test]
    fn test_compile_emits_startup_events() {
        let sink = MemorySink::new();
        let dispatcher =
            LocalDispatcher::compile(&contract(), "pantry", &handlers(), None, sink.as_ref()).unwrap();

        assert_eq!(dispatcher.len(), 2);
        assert_eq!(dispatcher.service(), "pantry");
        let startup = sink.named("startup");
        assert_eq!(startup.len(), 2);
        assert_eq!(startup[0].field("action"), Some(&json!("route_registration")));
        assert_eq!(startup[0].field("handler"), Some(&json!("pantry.get_shelf")));
    }

    #[test]
    fn test_unresolved_handler_fails() {
        let mut partial = HandlerRegistry::new();
        partial.register_sync("pantry.get_shelf", |_| Ok(json!(null).into()));

        let err = LocalDispatcher::compile(&contract(), "pantry", &partial, None, MemorySink::new().as_ref())
            .unwrap_err();
        assert!(matches!(
            err,
            ContractError::UnresolvedHandler { ref handler, .. } if handler == "pantry.clear_shelf"
        ));
    }

    #[test]
    fn test_unknown_service_fails() {
        let err = LocalDispatcher::compile(&contract(), "cellar", &handlers(), None, MemorySink::new().as_ref())
            .unwrap_err();
        assert!(matches!(err, ContractError::UnknownService(_)));
    }

    #[tokio::test]
    async fn test_dispatch_statuses() {
        let dispatcher =
            LocalDispatcher::compile(&contract(), "pantry", &handlers(), None, MemorySink::new().as_ref())
                .unwrap();
        let headers = HeaderMap::new();
        let body = Bytes::new();

        let out = dispatcher
            .dispatch(&Method::GET, "/shelves/top", parts(&headers, &body))
            .await
            .unwrap();
        assert_eq!(out.body, json!({"shelf": "top"}));

        let err = dispatcher
            .dispatch(&Method::PUT, "/shelves/top", parts(&headers, &body))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allowed_methods().map(<[Method]>::len), Some(2));

        let err = dispatcher
            .dispatch(&Method::GET, "/cellar", parts(&headers, &body))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
    }
}
