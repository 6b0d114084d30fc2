//! Gateway dispatch compiler.
//!
//! Every contract route becomes a [`ProxyTarget`] mounted at
//! `urlPrefix + path`. The upstream URL is the owning service's base URL
//! followed by the route template with each placeholder replaced by the
//! value captured from the inbound path; the prefix is not forwarded.
//!
//! ```text
//! inbound   GET /api/v1/recipes/123?x=1
//! template      /recipes/{id}
//! upstream  http://recipes:8001/recipes/123?x=1
//! ```

use http::Method;
use serde_json::json;
use switchyard_core::{Contract, ContractError, ContractResult, MeshError, MeshResult, Route};
use switchyard_router::{Lookup, PathParams, Router};
use switchyard_telemetry::{emit_detached, EventSink};

/// Where one contract route is forwarded.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    service: String,
    base_url: String,
    route: Route,
}

impl ProxyTarget {
    /// Owning service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The contract route.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Span name for calls through this target.
    #[must_use]
    pub fn span_name(&self) -> String {
        format!("proxy_{}_{}", self.service, self.route.method.as_str().to_lowercase())
    }

    /// Builds the upstream URL for a matched request.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a placeholder has no captured value.
    pub fn upstream_url(&self, params: &PathParams, query: Option<&str>) -> MeshResult<String> {
        let path = self
            .route
            .path
            .render(|name| params.get(name))
            .map_err(|e| MeshError::internal(format!("cannot build upstream path: {e}")))?;

        Ok(match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}{path}?{query}", self.base_url),
            None => format!("{}{path}", self.base_url),
        })
    }
}

/// The gateway's route table.
#[derive(Debug)]
pub struct GatewayTable {
    router: Router<ProxyTarget>,
}

impl GatewayTable {
    /// Mounts every route of every service under the contract's prefix.
    ///
    /// Emits one `startup` event per route.
    ///
    /// # Errors
    ///
    /// Fails if two services expose the same method on the same external
    /// path.
    pub fn compile(contract: &Contract, sink: &dyn EventSink) -> ContractResult<Self> {
        let mut router = Router::new();

        for (service, route) in contract.routes() {
            let external = contract.external_path(route);
            let target = ProxyTarget {
                service: service.name.clone(),
                base_url: service.url.trim_end_matches('/').to_string(),
                route: route.clone(),
            };

            router
                .insert(route.method.clone(), &external, target)
                .map_err(|conflict| ContractError::InvalidRoute {
                    service: service.name.clone(),
                    route: route.label(),
                    reason: conflict.message().to_string(),
                })?;

            tracing::info!(
                service = %service.name,
                method = %route.method,
                route = %external,
                upstream = %service.url,
                "registered gateway route"
            );
            emit_detached(
                sink,
                "startup",
                json!({
                    "action": "gateway.register_routes",
                    "name": service.name,
                    "method": route.method.as_str(),
                    "route": external,
                }),
            );
        }

        Ok(Self { router })
    }

    /// Number of mounted routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// Returns true if nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }

    /// Resolves an inbound request.
    ///
    /// # Errors
    ///
    /// 404 for an unknown path, 405 for a known path with another method.
    pub fn resolve(&self, method: &Method, path: &str) -> MeshResult<(&ProxyTarget, PathParams)> {
        match self.router.lookup(method, path) {
            Lookup::Found(found) => Ok((found.value, found.params)),
            Lookup::MethodNotAllowed(allowed) => {
                Err(MeshError::method_not_allowed(method.clone(), allowed))
            }
            Lookup::NotFound => Err(MeshError::not_found(format!("no route for {path}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use switchyard_core::{DocumentFormat, SchemaRegistry};
    use switchyard_telemetry::MemorySink;

    const CONTRACT: &str = r"
urlPrefix: /api/v1/
title: Kitchen
version: '1.0'
services:
  recipes:
    title: Recipes
    version: '1.0'
    url: http://recipes:8001/
    routes:
      - { method: GET, path: /recipes, handler: recipes.list }
      - { method: POST, path: /recipes, handler: recipes.create }
      - { method: GET, path: '/recipes/{id}', handler: recipes.get }
      - { method: GET, path: '/authors/{author}/recipes/{id}', handler: recipes.by_author }
  pantry:
    title: Pantry
    version: '1.0'
    url: http://pantry:8002
    routes:
      - { method: GET, path: '/shelves/{shelf}', handler: pantry.get }
";

    fn table() -> (GatewayTable, std::sync::Arc<MemorySink>) {
        let contract =
            Contract::parse(CONTRACT, DocumentFormat::Yaml, &SchemaRegistry::new()).unwrap();
        let sink = MemorySink::new();
        (GatewayTable::compile(&contract, sink.as_ref()).unwrap(), sink)
    }

    #[test]
    fn test_compile_mounts_under_prefix() {
        let (table, sink) = table();
        assert_eq!(table.len(), 5);

        let startup = sink.named("startup");
        assert_eq!(startup.len(), 5);
        assert_eq!(startup[0].field("action"), Some(&json!("gateway.register_routes")));
        assert_eq!(startup[0].field("route"), Some(&json!("/api/v1/recipes")));
    }

    #[test]
    fn test_upstream_url_substitution() {
        let (table, _) = table();
        let (target, params) = table.resolve(&Method::GET, "/api/v1/recipes/123").unwrap();
        assert_eq!(target.service(), "recipes");
        assert_eq!(
            target.upstream_url(&params, None).unwrap(),
            "http://recipes:8001/recipes/123"
        );
        assert_eq!(target.span_name(), "proxy_recipes_get");
    }

    #[test]
    fn test_upstream_url_with_query() {
        let (table, _) = table();
        let (target, params) = table.resolve(&Method::GET, "/api/v1/shelves/top").unwrap();
        assert_eq!(
            target.upstream_url(&params, Some("limit=5&offset=10")).unwrap(),
            "http://pantry:8002/shelves/top?limit=5&offset=10"
        );
        assert_eq!(
            target.upstream_url(&params, Some("")).unwrap(),
            "http://pantry:8002/shelves/top"
        );
    }

    #[test]
    fn test_resolve_errors() {
        let (table, _) = table();
        let err = table.resolve(&Method::DELETE, "/api/v1/recipes").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.allowed_methods().map(<[Method]>::len), Some(2));

        let err = table.resolve(&Method::GET, "/recipes/1").unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cross_service_conflict() {
        let yaml = r"
urlPrefix: /api
title: Clash
version: '1'
services:
  a:
    { title: A, version: '1', url: 'http://a', routes: [{ method: GET, path: /x, handler: a.x }] }
  b:
    { title: B, version: '1', url: 'http://b', routes: [{ method: GET, path: /x, handler: b.x }] }
";
        let contract = Contract::parse(yaml, DocumentFormat::Yaml, &SchemaRegistry::new()).unwrap();
        let err = GatewayTable::compile(&contract, MemorySink::new().as_ref()).unwrap_err();
        assert!(matches!(err, ContractError::InvalidRoute { ref service, .. } if service == "b"));
    }

    proptest! {
        #[test]
        fn prop_only_placeholders_change(author in "[a-z0-9]{1,12}", id in "[0-9]{1,9}") {
            let (table, _) = table();
            let inbound = format!("/api/v1/authors/{author}/recipes/{id}");
            let (target, params) = table.resolve(&Method::GET, &inbound).unwrap();
            let url = target.upstream_url(&params, None).unwrap();
            prop_assert_eq!(url, format!("http://recipes:8001/authors/{author}/recipes/{id}"));
        }
    }
}
