//! Configuration section types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_telemetry::{LogConfig, LogFormat};

/// HTTP listener settings.
///
/// # Example
///
/// ```
/// use switchyard_config::ServerConfig;
///
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:9000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.max_body_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Contract document settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContractConfig {
    /// Path to the contract document.
    #[serde(default = "default_contract_path")]
    pub path: String,

    /// Validate request bodies at the gateway before forwarding.
    #[serde(default)]
    pub strict_validation: bool,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            path: default_contract_path(),
            strict_validation: false,
        }
    }
}

fn default_contract_path() -> String {
    "contract.yaml".to_string()
}

/// Upstream call settings used by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Bound on every upstream call ("30s", "500ms", "2m").
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub timeout: Duration,

    /// Idle connections kept per upstream host.
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pool_max_idle() -> usize {
    32
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Whether logging is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            format: LogFormat::Json,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name reported in logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TelemetryConfigSection {
    /// Converts into the logging setup understood by `switchyard-telemetry`.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.logging.enabled,
            level: self.logging.level.clone(),
            format: self.logging.format,
            service_name: self.service_name.clone(),
            ..LogConfig::default()
        }
    }
}

fn default_service_name() -> String {
    "switchyard".to_string()
}
