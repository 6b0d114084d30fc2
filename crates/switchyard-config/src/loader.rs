//! Configuration loader with layered approach.

use std::env;
use std::fs;
use std::path::Path;

use switchyard_telemetry::LogFormat;

use crate::{duration, ConfigError, RuntimeConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON) or string
/// 3. Environment variables `PREFIX__SECTION__KEY`
/// 4. Command-line flags (`with_contract_path`, `with_listen_addr`)
///
/// A file replaces the defaults as a whole; keys it omits take their
/// default values.
///
/// # Example
///
/// ```no_run
/// use switchyard_config::ConfigLoader;
///
/// # fn main() -> Result<(), switchyard_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("gateway.toml")?
///     .with_dotenv()?
///     .with_env_prefix("SWITCHYARD")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: RuntimeConfig,
    env_prefix: Option<String>,
    contract_path: Option<String>,
    listen_addr: Option<String>,
}

impl ConfigLoader {
    /// Create a new loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = RuntimeConfig::development();
        self
    }

    /// Load configuration from a file. The format follows the extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable or invalid.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.config = parse(&content, format)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but is unreadable or invalid.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use switchyard_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [upstream]
    ///     timeout = "5s"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.upstream.timeout.as_secs(), 5);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Set the environment variable prefix for overrides.
    ///
    /// With prefix `SWITCHYARD`:
    /// - `SWITCHYARD__SERVER__LISTEN_ADDR=0.0.0.0:9000`
    /// - `SWITCHYARD__UPSTREAM__TIMEOUT=10s`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file from the working directory, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Dotenv` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv(e.to_string())),
        }
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<RuntimeConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        if let Some(path) = self.contract_path.take() {
            self.config.contract.path = path;
        }
        if let Some(addr) = self.listen_addr.take() {
            self.config.server.listen_addr = addr;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = rest.split("__").collect();
        match parts.as_slice() {
            ["SERVER", "LISTEN_ADDR"] => {
                self.config.server.listen_addr = value.to_string();
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::env(key, "expected integer"))?;
            }
            ["CONTRACT", "PATH"] => {
                self.config.contract.path = value.to_string();
            }
            ["CONTRACT", "STRICT_VALIDATION"] => {
                self.config.contract.strict_validation = parse_bool(value)
                    .ok_or_else(|| ConfigError::env(key, "expected boolean"))?;
            }
            ["UPSTREAM", "TIMEOUT"] => {
                self.config.upstream.timeout =
                    duration::parse(value).map_err(|reason| ConfigError::env(key, reason))?;
            }
            ["UPSTREAM", "POOL_MAX_IDLE_PER_HOST"] => {
                self.config.upstream.pool_max_idle_per_host = value
                    .parse()
                    .map_err(|_| ConfigError::env(key, "expected integer"))?;
            }
            ["TELEMETRY", "SERVICE_NAME"] => {
                self.config.telemetry.service_name = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env(key, "expected boolean"))?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            _ => {}
        }

        Ok(())
    }

    /// Overrides the contract path, as the `--contract` flag does.
    ///
    /// Applied after environment overrides.
    #[must_use]
    pub fn with_contract_path(mut self, path: impl Into<String>) -> Self {
        self.contract_path = Some(path.into());
        self
    }

    /// Overrides the listen address, as the `--listen` flag does.
    #[must_use]
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }
}

fn parse(content: &str, format: &str) -> Result<RuntimeConfig, ConfigError> {
    match format.to_ascii_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
