//! Typed runtime configuration for switchyard processes.
//!
//! Configuration is an explicit value built once at process entry and handed
//! to the runtime; there is no global.
//!
//! - [`ServerConfig`] - listen address and body limit
//! - [`ContractConfig`] - contract document path and gateway strict mode
//! - [`UpstreamConfig`] - upstream timeout and connection pool
//! - [`TelemetryConfigSection`] - service name and logging
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:8080"
//! max_body_bytes = 1048576
//!
//! [contract]
//! path = "contract.yaml"
//! strict_validation = false
//!
//! [upstream]
//! timeout = "30s"
//! pool_max_idle_per_host = 32
//!
//! [telemetry]
//! service_name = "gateway"
//!
//! [telemetry.logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub mod duration;
mod error;
mod loader;
mod schema;

pub use config::RuntimeConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    ContractConfig, LoggingConfig, ServerConfig, TelemetryConfigSection, UpstreamConfig,
};
pub use switchyard_telemetry::LogFormat;
