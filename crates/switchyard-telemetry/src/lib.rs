//! Trace propagation and logging for switchyard.
//!
//! - **Trace context**: a per-request trace id and LIFO span stack, made
//!   ambient for the request's task ([`TraceContext`], [`in_span`])
//! - **Structured events**: flat `{ts, trace_id, event, ...}` records
//!   delivered to an [`EventSink`]
//! - **Logging**: `tracing-subscriber` initialisation ([`init_logging`])
//!
//! # Architecture
//!
//! ```text
//!   x-trace-id ──► TraceContext::start ──► scope(request future)
//!                        │
//!            enter_span / exit_span / emit
//!                        │
//!                        ▼
//!                  EventSink::record
//!                        │
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!     JsonLineSink                MemorySink
//!  (stdout, one line each)         (tests)
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod error;
mod event;
pub mod logging;

pub use context::{
    emit_current, in_span, is_local_trace, SpanGuard, TraceContext, TraceOrigin,
    LOCAL_TRACE_PREFIX, TRACE_ID_HEADER,
};
pub use error::TelemetryError;
pub use event::{
    emit_detached, EventSink, JsonLineSink, MemorySink, SharedSink, StructuredEvent,
};
pub use logging::{create_env_filter, init_logging, json_subscriber, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
