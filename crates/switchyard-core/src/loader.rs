//! Contract document parsing and validation.
//!
//! Parsing happens in two passes: the document is deserialized into raw
//! structs mirroring its keys, then [`build`] checks every route and turns
//! the raw form into the immutable [`Contract`]. Every check in the second
//! pass is fatal.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::contract::{Contract, Dependency, ParamType, QueryParamSpec, Route, Service, Vendor};
use crate::error::{ContractError, ContractResult};
use crate::schema::{BoundSchema, Schema, SchemaRef, SchemaRegistry};
use crate::template::PathTemplate;

/// Methods a route may declare.
const SUPPORTED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// Serialization format of a contract document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// JSON (`.json`).
    Json,
    /// TOML (`.toml`).
    Toml,
}

impl DocumentFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> ContractResult<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ContractError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawContract {
    #[serde(rename = "urlPrefix", default)]
    url_prefix: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
    #[serde(rename = "tempDir", default)]
    temp_dir: Option<PathBuf>,
    #[serde(default)]
    schemas: IndexMap<String, Schema>,
    #[serde(default)]
    services: IndexMap<String, RawService>,
    #[serde(default)]
    vendors: IndexMap<String, RawVendor>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
    url: String,
    #[serde(default)]
    db: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    method: String,
    path: String,
    #[serde(default)]
    request_model: Option<String>,
    #[serde(default)]
    response_model: Option<String>,
    handler: String,
    #[serde(default)]
    query_params: IndexMap<String, RawQueryParam>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQueryParam {
    #[serde(rename = "type", default = "default_param_type")]
    kind: String,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    ge: Option<f64>,
    #[serde(default)]
    le: Option<f64>,
    #[serde(default)]
    example: Option<Value>,
}

fn default_param_type() -> String {
    "str".to_string()
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    version: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawVendor {
    url: String,
    #[serde(default)]
    product_url_identifier: Option<String>,
}

/// Deserializes a document into its raw form.
pub(crate) fn parse(content: &str, format: DocumentFormat) -> ContractResult<RawContract> {
    let malformed = |message: String| ContractError::Malformed {
        format: format.as_str(),
        message,
    };
    match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| malformed(e.to_string())),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|e| malformed(e.to_string())),
        DocumentFormat::Toml => toml::from_str(content).map_err(|e| malformed(e.to_string())),
    }
}

/// Validates the raw document and builds the contract.
pub(crate) fn build(raw: RawContract, registry: &SchemaRegistry) -> ContractResult<Contract> {
    let mut schemas = registry.clone();
    for (name, schema) in raw.schemas {
        schemas.register(name, schema)?;
    }

    let services = raw
        .services
        .into_iter()
        .map(|(name, service)| {
            let service = build_service(&name, service, &schemas)?;
            Ok((name, service))
        })
        .collect::<ContractResult<IndexMap<_, _>>>()?;

    let vendors = raw
        .vendors
        .into_iter()
        .map(|(name, vendor)| {
            let vendor = Vendor {
                name: name.clone(),
                url: vendor.url,
                product_url_identifier: vendor.product_url_identifier,
            };
            (name, vendor)
        })
        .collect();

    Ok(Contract {
        url_prefix: raw.url_prefix,
        title: raw.title,
        version: raw.version,
        temp_dir: raw.temp_dir,
        services,
        vendors,
    })
}

fn build_service(name: &str, raw: RawService, schemas: &SchemaRegistry) -> ContractResult<Service> {
    let mut seen_routes = HashSet::new();
    let mut routes = Vec::with_capacity(raw.routes.len());
    for raw_route in raw.routes {
        let route = build_route(name, raw_route, schemas)?;
        if !seen_routes.insert((route.method.clone(), route.path.normalized())) {
            return Err(ContractError::DuplicateRoute {
                service: name.to_string(),
                method: route.method,
                path: route.path.as_str().to_string(),
            });
        }
        routes.push(route);
    }

    let mut seen_deps = HashSet::new();
    let mut dependencies = Vec::with_capacity(raw.dependencies.len());
    for dep in raw.dependencies {
        if !seen_deps.insert(dep.name.clone()) {
            return Err(ContractError::DuplicateDependency {
                service: name.to_string(),
                name: dep.name,
            });
        }
        dependencies.push(Dependency {
            name: dep.name,
            title: dep.title,
            version: dep.version,
            url: dep.url,
        });
    }

    Ok(Service {
        name: name.to_string(),
        title: raw.title,
        version: raw.version,
        url: raw.url,
        db: raw.db,
        routes,
        dependencies,
    })
}

fn build_route(service: &str, raw: RawRoute, schemas: &SchemaRegistry) -> ContractResult<Route> {
    let method = parse_method(&raw.method).ok_or_else(|| ContractError::UnknownMethod {
        service: service.to_string(),
        method: raw.method.clone(),
    })?;
    let label = method.as_str();

    let path = PathTemplate::parse(&raw.path)
        .map_err(|e| ContractError::template(service, label, &raw.path, &e))?;

    if raw.handler.trim().is_empty() {
        return Err(ContractError::invalid_route(
            service,
            label,
            &raw.path,
            "handler reference is empty",
        ));
    }

    let resolve = |reference: Option<&str>| -> ContractResult<Option<BoundSchema>> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        schemas
            .resolve(&SchemaRef::parse(reference))
            .map(Some)
            .ok_or_else(|| ContractError::UnresolvedSchema {
                service: service.to_string(),
                route: format!("{label} {}", raw.path),
                reference: reference.to_string(),
            })
    };
    let request_schema = resolve(raw.request_model.as_deref())?;
    let response_schema = resolve(raw.response_model.as_deref())?;

    let query_params = raw
        .query_params
        .into_iter()
        .map(|(name, spec)| {
            let spec = build_query_param(&name, spec)
                .map_err(|reason| ContractError::invalid_route(service, label, &raw.path, reason))?;
            Ok((name, spec))
        })
        .collect::<ContractResult<IndexMap<_, _>>>()?;

    Ok(Route {
        method,
        path,
        request_schema,
        response_schema,
        handler: raw.handler,
        query_params,
        description: raw.description,
        tags: raw.tags.into_iter().collect::<BTreeSet<_>>(),
    })
}

fn parse_method(raw: &str) -> Option<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    SUPPORTED_METHODS
        .iter()
        .find(|method| method.as_str() == upper)
        .cloned()
}

fn build_query_param(name: &str, raw: RawQueryParam) -> Result<QueryParamSpec, String> {
    let kind = ParamType::parse(&raw.kind)
        .ok_or_else(|| format!("query parameter '{name}' has unknown type '{}'", raw.kind))?;

    let numeric = matches!(kind, ParamType::Integer | ParamType::Number);
    if !numeric && (raw.ge.is_some() || raw.le.is_some()) {
        return Err(format!(
            "query parameter '{name}' declares bounds but is a {}",
            kind.as_str()
        ));
    }
    if let (Some(ge), Some(le)) = (raw.ge, raw.le) {
        if ge > le {
            return Err(format!("query parameter '{name}' has ge {ge} above le {le}"));
        }
    }
    if let Some(default) = raw.default.as_ref().filter(|d| !kind.conforms(d)) {
        return Err(format!(
            "query parameter '{name}' default {default} is not a {}",
            kind.as_str()
        ));
    }

    Ok(QueryParamSpec {
        kind,
        default: raw.default,
        ge: raw.ge,
        le: raw.le,
        example: raw.example,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RECIPES: &str = r#"
urlPrefix: /api/v1
title: Kitchen
version: "1.0"
tempDir: /tmp/kitchen
schemas:
  recipe.RecipeOut:
    type: object
    required: [id, title]
    properties:
      id: { type: string }
      title: { type: string }
services:
  recipe:
    title: Recipes
    version: "1.0"
    url: http://recipes:8000
    db: postgres://recipes
    routes:
      - method: get
        path: /recipes
        handler: recipes.list_recipes
        response_model: recipe.RecipeOut[]
        tags: [recipes]
        query_params:
          limit: { type: int, default: 20, ge: 1, le: 100 }
          search: { type: str }
      - method: POST
        path: /recipes
        handler: recipes.create_recipe
        request_model: recipe.RecipeCreate
        response_model: recipe.RecipeOut
      - method: GET
        path: /recipes/{id}
        handler: recipes.get_recipe
    dependencies:
      - name: queue
        title: Queue
        version: "3"
        url: amqp://queue
vendors:
  grocer:
    url: https://grocer.example
    product_url_identifier: /p/
"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with(
                "recipe.RecipeCreate",
                Schema::object().required_property("title", Schema::string().min_length(2)),
            )
            .unwrap()
    }

    fn load_yaml(doc: &str) -> ContractResult<Contract> {
        Contract::parse(doc, DocumentFormat::Yaml, &registry())
    }

    #[test]
    fn test_load_full_document() {
        let contract = load_yaml(RECIPES).unwrap();
        assert_eq!(contract.url_prefix, "/api/v1");
        assert_eq!(contract.temp_dir, Some(PathBuf::from("/tmp/kitchen")));

        let service = contract.service("recipe").unwrap();
        assert!(service.has_persistence());
        assert_eq!(service.routes.len(), 3);

        let list = &service.routes[0];
        assert_eq!(list.method, Method::GET);
        assert!(list.response_schema.as_ref().unwrap().reference().many);
        assert_eq!(list.query_params["limit"].default, Some(serde_json::json!(20)));
        assert_eq!(list.query_params["search"].kind, ParamType::String);
        assert!(list.tags.contains("recipes"));

        let create = &service.routes[1];
        assert_eq!(
            create.request_schema.as_ref().unwrap().reference().name,
            "recipe.RecipeCreate"
        );
        assert_eq!(contract.external_path(&service.routes[2]), "/api/v1/recipes/{id}");
    }

    #[test]
    fn test_lookup_helpers() {
        let contract = load_yaml(RECIPES).unwrap();
        assert_eq!(contract.dependency("recipe", "queue").unwrap().url, "amqp://queue");
        assert_eq!(
            contract.vendor("grocer").unwrap().product_url_identifier.as_deref(),
            Some("/p/")
        );

        assert!(matches!(
            contract.service("catalog"),
            Err(ContractError::UnknownService(_))
        ));
        assert!(matches!(
            contract.dependency("recipe", "llm"),
            Err(ContractError::UnknownDependency { .. })
        ));
        assert!(matches!(
            contract.vendor("nobody"),
            Err(ContractError::UnknownVendor(_))
        ));
    }

    #[test]
    fn test_same_path_different_methods_is_fine() {
        let contract = load_yaml(RECIPES).unwrap();
        let paths: Vec<_> = contract
            .routes()
            .filter(|(_, r)| r.path.as_str() == "/recipes")
            .map(|(_, r)| r.method.clone())
            .collect();
        assert_eq!(paths, vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - { method: GET, path: /recipes, handler: a }
      - { method: get, path: /recipes/, handler: b }
";
        assert!(matches!(
            load_yaml(doc),
            Err(ContractError::DuplicateRoute { method, .. }) if method == Method::GET
        ));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - { method: FETCH, path: /recipes, handler: a }
";
        assert!(matches!(
            load_yaml(doc),
            Err(ContractError::UnknownMethod { method, .. }) if method == "FETCH"
        ));
    }

    #[test]
    fn test_unresolved_schema_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - { method: POST, path: /recipes, handler: a, request_model: recipe.Missing }
";
        let err = load_yaml(doc).unwrap_err();
        assert!(err.to_string().contains("recipe.Missing"));
    }

    #[test]
    fn test_malformed_template_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - { method: GET, path: '/recipes/id-{id}', handler: a }
";
        assert!(matches!(
            load_yaml(doc),
            Err(ContractError::InvalidRoute { .. })
        ));
    }

    #[test]
    fn test_query_default_must_match_type() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - method: GET
        path: /recipes
        handler: a
        query_params:
          limit: { type: int, default: lots }
";
        let err = load_yaml(doc).unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_bounds_on_string_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    routes:
      - method: GET
        path: /recipes
        handler: a
        query_params:
          sort: { type: str, ge: 1 }
";
        assert!(load_yaml(doc).is_err());
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let doc = r"
services:
  recipe:
    url: http://recipes
    dependencies:
      - { name: queue, url: amqp://a }
      - { name: queue, url: amqp://b }
";
        assert!(matches!(
            load_yaml(doc),
            Err(ContractError::DuplicateDependency { .. })
        ));
    }

    #[test]
    fn test_document_schema_clashes_with_registry() {
        let doc = r"
schemas:
  recipe.RecipeCreate: { type: any }
services: {}
";
        assert!(matches!(
            load_yaml(doc),
            Err(ContractError::DuplicateSchema(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            load_yaml("services: [not, a, map"),
            Err(ContractError::Malformed { format: "yaml", .. })
        ));
    }

    #[test]
    fn test_json_and_toml_formats() {
        let json = r#"{
            "urlPrefix": "/api",
            "services": {
                "recipe": {
                    "url": "http://recipes",
                    "routes": [{"method": "DELETE", "path": "/recipes/{id}", "handler": "del"}]
                }
            }
        }"#;
        let contract = Contract::parse(json, DocumentFormat::Json, &registry()).unwrap();
        assert_eq!(contract.service("recipe").unwrap().routes[0].method, Method::DELETE);

        let toml = r#"
urlPrefix = "/api"

[services.recipe]
url = "http://recipes"

[[services.recipe.routes]]
method = "GET"
path = "/recipes"
handler = "list"
query_params = { limit = { type = "int", default = 100, ge = 0 } }
"#;
        let contract = Contract::parse(toml, DocumentFormat::Toml, &registry()).unwrap();
        let route = &contract.service("recipe").unwrap().routes[0];
        assert_eq!(route.query_params["limit"].ge, Some(0.0));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(RECIPES.as_bytes()).unwrap();

        let contract = Contract::load(file.path(), &registry()).unwrap();
        assert_eq!(contract.title, "Kitchen");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            Contract::load(file.path(), &registry()),
            Err(ContractError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Contract::load("/nonexistent/contract.yaml", &registry()),
            Err(ContractError::Read { .. })
        ));
    }
}
