//! Error types for switchyard.
//!
//! Two families live here:
//!
//! - [`ContractError`]: configuration problems found while loading a
//!   contract. These are operator errors and stop the process at startup.
//! - [`MeshError`]: request-time failures. Each maps to an
//!   [`ErrorCategory`], an HTTP status and a JSON [`ErrorEnvelope`].
//!
//! | `ErrorCategory` | Status |
//! |---|---|
//! | `Validation` | 400 or 422 |
//! | `NotFound` | 404 |
//! | `MethodNotAllowed` | 405 |
//! | `PayloadTooLarge` | 413 |
//! | `Upstream` | 502 |
//! | `Timeout` | 504 |
//! | `Persistence` | 503 |
//! | `Internal` | 500 |
//! | `Domain` | chosen by the handler |

use std::path::PathBuf;

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::TemplateError;

/// Result type alias using [`ContractError`].
pub type ContractResult<T> = Result<T, ContractError>;

/// Result type alias using [`MeshError`].
pub type MeshResult<T> = Result<T, MeshError>;

/// A contract could not be loaded or compiled.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The document could not be read.
    #[error("failed to read contract {path}: {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension names no supported format.
    #[error("unsupported contract format: {0}")]
    UnsupportedFormat(String),

    /// The document is not valid for its format.
    #[error("malformed {format} contract: {message}")]
    Malformed {
        /// Document format.
        format: &'static str,
        /// Parser message.
        message: String,
    },

    /// A route definition is invalid.
    #[error("service '{service}' route '{route}': {reason}")]
    InvalidRoute {
        /// Owning service.
        service: String,
        /// Route as `METHOD path`.
        route: String,
        /// What is wrong.
        reason: String,
    },

    /// A route uses a verb outside the supported set.
    #[error("service '{service}': unknown HTTP method '{method}'")]
    UnknownMethod {
        /// Owning service.
        service: String,
        /// Method as written.
        method: String,
    },

    /// The same `(method, path)` appears twice in one service.
    #[error("service '{service}': duplicate route {method} {path}")]
    DuplicateRoute {
        /// Owning service.
        service: String,
        /// Route method.
        method: Method,
        /// Route path.
        path: String,
    },

    /// A request or response schema reference has no registered schema.
    #[error("service '{service}' route '{route}': unresolved schema '{reference}'")]
    UnresolvedSchema {
        /// Owning service.
        service: String,
        /// Route as `METHOD path`.
        route: String,
        /// Reference as written.
        reference: String,
    },

    /// A handler reference has no registered handler.
    #[error("service '{service}' route '{route}': unresolved handler '{handler}'")]
    UnresolvedHandler {
        /// Owning service.
        service: String,
        /// Route as `METHOD path`.
        route: String,
        /// Handler reference.
        handler: String,
    },

    /// A schema name was registered twice.
    #[error("schema '{0}' is defined more than once")]
    DuplicateSchema(String),

    /// A dependency name appears twice in one service.
    #[error("service '{service}': duplicate dependency '{name}'")]
    DuplicateDependency {
        /// Owning service.
        service: String,
        /// Dependency name.
        name: String,
    },

    /// No service with this name.
    #[error("unknown service '{0}'")]
    UnknownService(String),

    /// The service declares no dependency with this name.
    #[error("service '{service}' has no dependency named '{name}'")]
    UnknownDependency {
        /// Owning service.
        service: String,
        /// Dependency name.
        name: String,
    },

    /// No vendor with this name.
    #[error("unknown vendor '{0}'")]
    UnknownVendor(String),

    /// The service declares a database but no persistence collaborator was supplied.
    #[error("service '{service}' declares a database but no persistence layer was provided")]
    MissingPersistence {
        /// Owning service.
        service: String,
    },
}

impl ContractError {
    pub(crate) fn invalid_route(
        service: &str,
        method: &str,
        path: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRoute {
            service: service.to_string(),
            route: format!("{method} {path}"),
            reason: reason.into(),
        }
    }

    pub(crate) fn template(service: &str, method: &str, path: &str, err: &TemplateError) -> Self {
        Self::invalid_route(service, method, path, err.to_string())
    }
}

/// Categories of request-time errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or invalid input.
    Validation,
    /// No route or resource.
    NotFound,
    /// Path exists but not for this method.
    MethodNotAllowed,
    /// Body exceeds the configured limit.
    PayloadTooLarge,
    /// An upstream call failed at the transport level.
    Upstream,
    /// An upstream call timed out.
    Timeout,
    /// The persistence collaborator failed.
    Persistence,
    /// Anything else that went wrong on our side.
    Internal,
    /// Raised by application logic inside a handler.
    Domain,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal | Self::Domain => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Request-time error.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use switchyard_core::MeshError;
///
/// let err = MeshError::domain(StatusCode::NOT_FOUND, "RECIPE_NOT_FOUND", "no recipe 7");
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
///
/// let envelope = err.to_envelope(Some("abc-123"));
/// assert_eq!(envelope.error.code, "RECIPE_NOT_FOUND");
/// ```
#[derive(Debug, Error)]
pub enum MeshError {
    /// Request input was invalid.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable message.
        message: String,
        /// Offending field or JSON path.
        field: Option<String>,
        /// 400 for malformed input, 422 for schema violations.
        status: StatusCode,
    },

    /// No route matched.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// The path matched but the method did not.
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// Requested method.
        method: Method,
        /// Methods the path accepts.
        allowed: Vec<Method>,
    },

    /// Body larger than the configured limit.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Limit in bytes.
        limit: usize,
    },

    /// Upstream transport failure.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Human-readable message.
        message: String,
        /// Upstream service name.
        service: Option<String>,
    },

    /// Upstream timeout.
    #[error("Timeout: {message}")]
    Timeout {
        /// Human-readable message.
        message: String,
        /// Upstream service name.
        service: Option<String>,
    },

    /// Persistence acquisition or release failed.
    #[error("Persistence error: {message}")]
    Persistence {
        /// Human-readable message.
        message: String,
    },

    /// Internal failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Error raised by a handler, relayed verbatim.
    #[error("{message}")]
    Domain {
        /// Status chosen by the handler.
        status: StatusCode,
        /// Machine-readable code chosen by the handler.
        code: String,
        /// Human-readable message.
        message: String,
        /// Extra payload.
        details: Option<serde_json::Value>,
    },
}

impl MeshError {
    /// Creates a 400 validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Creates a 422 validation error for a schema violation at `field`.
    #[must_use]
    pub fn unprocessable(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            status: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method not allowed error.
    #[must_use]
    pub fn method_not_allowed(method: Method, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed { method, allowed }
    }

    /// Creates an upstream transport error.
    #[must_use]
    pub fn upstream(message: impl Into<String>, service: Option<impl Into<String>>) -> Self {
        Self::Upstream {
            message: message.into(),
            service: service.map(Into::into),
        }
    }

    /// Creates an upstream timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>, service: Option<impl Into<String>>) -> Self {
        Self::Timeout {
            message: message.into(),
            service: service.map(Into::into),
        }
    }

    /// Creates a persistence error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a handler-domain error.
    #[must_use]
    pub fn domain(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attaches details to a domain error. Other variants are returned unchanged.
    #[must_use]
    pub fn with_details(mut self, value: serde_json::Value) -> Self {
        if let Self::Domain { details, .. } = &mut self {
            *details = Some(value);
        }
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Persistence { .. } => ErrorCategory::Persistence,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::Domain { .. } => ErrorCategory::Domain,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { status, .. } | Self::Domain { status, .. } => *status,
            _ => self.category().default_status_code(),
        }
    }

    /// Methods to advertise in an `allow` header, if any.
    #[must_use]
    pub fn allowed_methods(&self) -> Option<&[Method]> {
        match self {
            Self::MethodNotAllowed { allowed, .. } => Some(allowed),
            _ => None,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> String {
        match self {
            Self::Domain { code, .. } => return code.clone(),
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Timeout { .. } => "UPSTREAM_TIMEOUT",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
        .to_string()
    }

    /// Converts this error to a serializable envelope.
    #[must_use]
    pub fn to_envelope(&self, trace_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.to_string(),
                category: self.category(),
                details: self.error_details(),
            },
            trace_id: trace_id.map(ToString::to_string),
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            Self::MethodNotAllowed { allowed, .. } => Some(serde_json::json!({
                "allowed": allowed.iter().map(Method::as_str).collect::<Vec<_>>()
            })),
            Self::PayloadTooLarge { limit } => Some(serde_json::json!({ "limit": limit })),
            Self::Upstream {
                service: Some(svc), ..
            }
            | Self::Timeout {
                service: Some(svc), ..
            } => Some(serde_json::json!({ "service": svc })),
            Self::Domain { details, .. } => details.clone(),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// Trace id of the failed request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
