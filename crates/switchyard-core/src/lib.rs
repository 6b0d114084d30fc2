//! # Switchyard Core
//!
//! The contract model shared by the gateway and every backend service.
//!
//! - [`Contract`] - Immutable description of services, routes and vendors
//! - [`PathTemplate`] - Parsed `{name}` route templates
//! - [`Schema`] / [`SchemaRegistry`] - Structural validators for request and response bodies
//! - [`ContractError`] - Fatal configuration errors raised at startup
//! - [`MeshError`] - Request-time errors with HTTP status mapping
//! - [`error_response`] / [`json_response`] - JSON responses shared by both runtimes

#![doc(html_root_url = "https://docs.rs/switchyard-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod contract;
mod error;
mod loader;
mod response;
pub mod schema;
mod template;

pub use contract::{Contract, Dependency, ParamType, QueryParamSpec, Route, Service, Vendor};
pub use error::{
    ContractError, ContractResult, ErrorCategory, ErrorDetail, ErrorEnvelope, MeshError,
    MeshResult,
};
pub use loader::DocumentFormat;
pub use response::{error_response, json_response, JSON_CONTENT_TYPE};
pub use schema::{BoundSchema, Schema, SchemaRef, SchemaRegistry, ValidationError};
pub use template::{PathTemplate, TemplateError, TemplateSegment};
