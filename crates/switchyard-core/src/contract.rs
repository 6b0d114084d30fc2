//! The contract model.
//!
//! A [`Contract`] is built once at process start by the loader and never
//! mutated afterwards. Both runtimes borrow it (usually through an `Arc`) and
//! compile their own route tables from it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use http::Method;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ContractError, ContractResult};
use crate::loader::{self, DocumentFormat};
use crate::schema::{BoundSchema, SchemaRegistry};
use crate::template::PathTemplate;

/// Root of a loaded contract.
#[derive(Debug, Clone)]
pub struct Contract {
    /// Prefix applied to every externally exposed path, such as `/api/v1`.
    pub url_prefix: String,
    /// Human-readable title.
    pub title: String,
    /// Contract version.
    pub version: String,
    /// Scratch directory shared by services, if configured.
    pub temp_dir: Option<PathBuf>,
    /// Services by name.
    pub services: IndexMap<String, Service>,
    /// External vendors by name.
    pub vendors: IndexMap<String, Vendor>,
}

impl Contract {
    /// Loads a contract document from disk, picking the format from the
    /// file extension.
    ///
    /// Schema references are resolved against `schemas` plus the document's
    /// own `schemas` section.
    pub fn load(path: impl AsRef<Path>, schemas: &SchemaRegistry) -> ContractResult<Self> {
        let path = path.as_ref();
        let format = DocumentFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|source| ContractError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, format, schemas)
    }

    /// Parses a contract from a string in the given format.
    pub fn parse(
        content: &str,
        format: DocumentFormat,
        schemas: &SchemaRegistry,
    ) -> ContractResult<Self> {
        let raw = loader::parse(content, format)?;
        loader::build(raw, schemas)
    }

    /// Looks up a service by name.
    pub fn service(&self, name: &str) -> ContractResult<&Service> {
        self.services
            .get(name)
            .ok_or_else(|| ContractError::UnknownService(name.to_string()))
    }

    /// Looks up a dependency declared by a service.
    pub fn dependency(&self, service: &str, name: &str) -> ContractResult<&Dependency> {
        self.service(service)?.dependency(name)
    }

    /// Looks up a vendor by name.
    pub fn vendor(&self, name: &str) -> ContractResult<&Vendor> {
        self.vendors
            .get(name)
            .ok_or_else(|| ContractError::UnknownVendor(name.to_string()))
    }

    /// Every route in the contract with its owning service.
    pub fn routes(&self) -> impl Iterator<Item = (&Service, &Route)> {
        self.services
            .values()
            .flat_map(|service| service.routes.iter().map(move |route| (service, route)))
    }

    /// Joins the URL prefix with a route path.
    #[must_use]
    pub fn external_path(&self, route: &Route) -> String {
        let prefix = self.url_prefix.trim_end_matches('/');
        format!("{prefix}{}", route.path.as_str())
    }
}

/// A logical service.
#[derive(Debug, Clone)]
pub struct Service {
    /// Unique name, also the logging dimension.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Service version.
    pub version: String,
    /// Base URL the gateway forwards to.
    pub url: String,
    /// Opaque database reference, consumed only by the persistence layer.
    pub db: Option<String>,
    /// Routes in declaration order.
    pub routes: Vec<Route>,
    /// Dependencies in declaration order.
    pub dependencies: Vec<Dependency>,
}

impl Service {
    /// Looks up a dependency by name.
    pub fn dependency(&self, name: &str) -> ContractResult<&Dependency> {
        self.dependencies
            .iter()
            .find(|dep| dep.name == name)
            .ok_or_else(|| ContractError::UnknownDependency {
                service: self.name.clone(),
                name: name.to_string(),
            })
    }

    /// Whether the service declares a database.
    #[must_use]
    pub fn has_persistence(&self) -> bool {
        self.db.is_some()
    }
}

/// One `(method, path)` endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    /// HTTP method.
    pub method: Method,
    /// Path template relative to the URL prefix.
    pub path: PathTemplate,
    /// Schema the request body must satisfy.
    pub request_schema: Option<BoundSchema>,
    /// Schema the response is expected to satisfy.
    pub response_schema: Option<BoundSchema>,
    /// Handler reference, resolved by the local dispatch compiler.
    pub handler: String,
    /// Recognized query parameters.
    pub query_params: IndexMap<String, QueryParamSpec>,
    /// Free-form description.
    pub description: Option<String>,
    /// Grouping tags.
    pub tags: BTreeSet<String>,
}

impl Route {
    /// `METHOD path`, used in logs and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Primitive type of a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Signed integer.
    Integer,
    /// Floating point number.
    Number,
    /// Text.
    String,
    /// Boolean.
    Boolean,
}

impl ParamType {
    /// Parses a type name as written in the contract.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Self::Integer),
            "float" | "number" => Some(Self::Number),
            "str" | "string" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Whether a JSON value has this type.
    #[must_use]
    pub fn conforms(self, value: &Value) -> bool {
        match self {
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }

    /// Name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// Declaration of one query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParamSpec {
    /// Declared type.
    pub kind: ParamType,
    /// Value used when the parameter is absent.
    pub default: Option<Value>,
    /// Inclusive lower bound for numeric types.
    pub ge: Option<f64>,
    /// Inclusive upper bound for numeric types.
    pub le: Option<f64>,
    /// Documentation example.
    pub example: Option<Value>,
}

impl QueryParamSpec {
    /// A parameter of `kind` with no default or bounds.
    #[must_use]
    pub fn new(kind: ParamType) -> Self {
        Self {
            kind,
            default: None,
            ge: None,
            le: None,
            example: None,
        }
    }

    /// Sets the default.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the inclusive bounds.
    #[must_use]
    pub fn with_bounds(mut self, ge: Option<f64>, le: Option<f64>) -> Self {
        self.ge = ge;
        self.le = le;
        self
    }
}

/// A named pointer to something a service calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name, unique within the service.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Version.
    pub version: String,
    /// Address.
    pub url: String,
}

/// An external vendor site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    /// Name.
    pub name: String,
    /// Base URL.
    pub url: String,
    /// Marker identifying product pages on the vendor site.
    pub product_url_identifier: Option<String>,
}
