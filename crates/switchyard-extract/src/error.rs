//! Extraction error types.
//!
//! An [`ExtractionError`] records where extraction failed and why. It
//! converts into a [`MeshError`] so runtimes can render it with the common
//! error envelope.

use std::fmt;

use http::StatusCode;
use switchyard_core::MeshError;

/// Where data was being extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Path parameters (`/recipes/{id}`).
    Path,
    /// Query string parameters.
    Query,
    /// Request body.
    Body,
    /// Content-Type header.
    ContentType,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
            Self::ContentType => write!(f, "content-type"),
        }
    }
}

/// Error that occurs during extraction.
///
/// # Example
///
/// ```rust
/// use switchyard_extract::{ExtractionError, ExtractionSource};
/// use http::StatusCode;
///
/// let err = ExtractionError::invalid_type(ExtractionSource::Query, "limit", "expected integer");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.field(), Some("limit"));
/// ```
#[derive(Debug)]
pub struct ExtractionError {
    extraction_source: ExtractionSource,
    kind: ExtractionErrorKind,
    field: Option<String>,
    message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractionErrorKind {
    Missing,
    InvalidType,
    ValidationFailed,
    DeserializationFailed,
    PayloadTooLarge { limit: usize },
    UnsupportedMediaType,
}

impl ExtractionError {
    /// A required value is missing.
    #[must_use]
    pub fn missing(source: ExtractionSource, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            extraction_source: source,
            kind: ExtractionErrorKind::Missing,
            message: format!("missing required {source} value: {field}"),
            field: Some(field),
        }
    }

    /// A value could not be coerced to its declared type.
    #[must_use]
    pub fn invalid_type(
        source: ExtractionSource,
        field: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let details = details.into();
        Self {
            extraction_source: source,
            kind: ExtractionErrorKind::InvalidType,
            message: format!("invalid {source} parameter '{field}': {details}"),
            field: Some(field),
        }
    }

    /// A value was well-formed but violated a bound or schema.
    #[must_use]
    pub fn validation_failed(
        source: ExtractionSource,
        field: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let details = details.into();
        Self {
            extraction_source: source,
            kind: ExtractionErrorKind::ValidationFailed,
            message: format!("validation failed for {source} '{field}': {details}"),
            field: Some(field),
        }
    }

    /// The raw input could not be parsed.
    #[must_use]
    pub fn deserialization_failed(source: ExtractionSource, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            extraction_source: source,
            kind: ExtractionErrorKind::DeserializationFailed,
            message: format!("failed to deserialize {source}: {error}"),
            field: None,
        }
    }

    /// The body exceeded `limit` bytes.
    #[must_use]
    pub fn payload_too_large(limit: usize) -> Self {
        Self {
            extraction_source: ExtractionSource::Body,
            kind: ExtractionErrorKind::PayloadTooLarge { limit },
            message: format!("payload too large: limit is {limit} bytes"),
            field: None,
        }
    }

    /// The body has a content type other than the expected one.
    #[must_use]
    pub fn unsupported_media_type(expected: &str, actual: Option<&str>) -> Self {
        let actual = actual.unwrap_or("none");
        Self {
            extraction_source: ExtractionSource::ContentType,
            kind: ExtractionErrorKind::UnsupportedMediaType,
            message: format!("unsupported content type: expected '{expected}', got '{actual}'"),
            field: None,
        }
    }

    /// Returns the extraction source.
    #[must_use]
    pub fn extraction_source(&self) -> ExtractionSource {
        self.extraction_source
    }

    /// Returns the field name if applicable.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ExtractionErrorKind::Missing
            | ExtractionErrorKind::InvalidType
            | ExtractionErrorKind::DeserializationFailed => StatusCode::BAD_REQUEST,
            ExtractionErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            ExtractionErrorKind::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ExtractionErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExtractionError {}

impl From<ExtractionError> for MeshError {
    fn from(err: ExtractionError) -> Self {
        match err.kind {
            ExtractionErrorKind::PayloadTooLarge { limit } => Self::PayloadTooLarge { limit },
            _ => Self::Validation {
                status: err.status_code(),
                message: err.message,
                field: err.field,
            },
        }
    }
}
