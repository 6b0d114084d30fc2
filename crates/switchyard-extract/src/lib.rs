//! Request extraction for switchyard routes.
//!
//! - [`QueryExtractor`] - per-route query parameter extraction with defaults,
//!   type coercion and bounds
//! - [`decode_json`] - JSON body decoding with schema validation
//! - [`ExtractionError`] - client errors raised by either, convertible into
//!   [`switchyard_core::MeshError`]

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod error;
mod query;

pub use body::{decode_json, from_value, is_json_content_type};
pub use error::{ExtractionError, ExtractionSource};
pub use query::{QueryExtractor, QueryOptions};
