//! Diagnostic logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! JSON formatter (production) or a pretty formatter (development).
//! JSON lines are flat and carry the enclosing `request` span, so every line
//! logged while a request runs has its `trace_id` under `span`. Structured
//! trace events bypass the formatter and are written whole by
//! [`JsonLineSink`](crate::JsonLineSink).
//!
//! # Example
//!
//! ```rust,ignore
//! use switchyard_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(service = "recipe", "listening");
//! ```

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. "info", "switchyard=debug,hyper=warn").
    /// `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to include the target (module path).
    pub include_target: bool,

    /// Service name, recorded once at startup.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            include_target: true,
            service_name: "switchyard".to_string(),
        }
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            ..Self::default()
        }
    }
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter is invalid or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => create_env_filter(&config.level)?,
    };

    match config.format {
        LogFormat::Json => {
            json_subscriber(filter, config.include_target, std::io::stdout)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(config.include_target)
                .with_filter(filter);
            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
        }
    }

    tracing::info!(service = %config.service_name, level = %config.level, "logging initialized");
    Ok(())
}

/// Builds the JSON subscriber without installing it.
///
/// Event fields are flattened to the top level and the current span is
/// attached under `span`.
pub fn json_subscriber<W>(
    filter: EnvFilter,
    include_target: bool,
    make_writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(include_target)
        .with_writer(make_writer)
        .with_filter(filter);
    tracing_subscriber::registry().with(fmt_layer)
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns error if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

/// Standard field names shared by log lines and structured events.
pub mod fields {
    /// Trace id.
    pub const TRACE_ID: &str = "trace_id";

    /// HTTP method.
    pub const METHOD: &str = "method";

    /// Request path.
    pub const PATH: &str = "path";

    /// Response status code.
    pub const STATUS: &str = "status";

    /// Duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Service name.
    pub const SERVICE: &str = "service";

    /// Handler reference.
    pub const HANDLER: &str = "handler";

    /// Startup action.
    pub const ACTION: &str = "action";
}
