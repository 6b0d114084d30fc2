//! Root configuration type.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use switchyard_telemetry::LogFormat;

use crate::{ConfigError, ContractConfig, ServerConfig, TelemetryConfigSection, UpstreamConfig};

/// Complete runtime configuration for a gateway or backend service process.
///
/// Built once at process entry by a [`ConfigLoader`](crate::ConfigLoader) and
/// passed by reference into the runtime.
///
/// # Example
///
/// ```
/// use switchyard_config::RuntimeConfig;
///
/// let config = RuntimeConfig::default();
/// assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
/// assert!(!config.contract.strict_validation);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Contract document settings.
    #[serde(default)]
    pub contract: ContractConfig,

    /// Upstream call settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Logging settings.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl RuntimeConfig {
    /// Checks values that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the listen address does not
    /// parse, the body limit or upstream timeout is zero, or the contract
    /// path is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.upstream.timeout.is_zero() {
            return Err(ConfigError::invalid(
                "upstream.timeout",
                "must be greater than zero",
            ));
        }

        if self.contract.path.trim().is_empty() {
            return Err(ConfigError::invalid("contract.path", "must not be empty"));
        }

        Ok(())
    }

    /// The parsed listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen_addr.parse().map_err(|_| {
            ConfigError::invalid(
                "server.listen_addr",
                format!("invalid socket address: {}", self.server.listen_addr),
            )
        })
    }

    /// Development preset: pretty debug logs on localhost.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.listen_addr = "127.0.0.1:8080".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config
    }
}
