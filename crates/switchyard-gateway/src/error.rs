//! Gateway startup and serving errors.
//!
//! Request-time failures are [`MeshError`](switchyard_core::MeshError)s and
//! never reach this type; these are the errors that stop the process.

use switchyard_config::ConfigError;
use switchyard_core::ContractError;
use switchyard_telemetry::TelemetryError;
use thiserror::Error;

/// Errors that prevent the gateway from starting or serving.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Runtime configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The contract could not be loaded or compiled.
    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    /// Logging could not be initialized.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The upstream HTTP client could not be built.
    #[error("Proxy client error: {message}")]
    Client {
        /// Error message.
        message: String,
    },

    /// Binding or accepting failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a client construction error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }
}

/// Result alias for gateway startup.
pub type GatewayResult<T> = Result<T, GatewayError>;
