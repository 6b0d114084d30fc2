//! Errors raised while assembling a [`RuntimeConfig`](crate::RuntimeConfig).
//!
//! Every variant is fatal: a binary reports it and exits before binding a
//! listener.

use std::path::PathBuf;

use thiserror::Error;

/// Why a configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `--config` named a file that does not exist.
    #[error("no configuration at {}", path.display())]
    Missing {
        /// Requested location.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format '{0}' (expected toml or json)")]
    UnsupportedFormat(String),

    /// The document did not deserialize into the configuration sections.
    #[error("malformed {format} configuration: {message}")]
    Malformed {
        /// "toml" or "json".
        format: &'static str,
        /// Parser message, including the offending key when known.
        message: String,
    },

    /// A `.env` file is present but broken.
    #[error(".env: {0}")]
    Dotenv(String),

    /// A `SWITCHYARD__*` variable holds a value of the wrong shape.
    #[error("{var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// Expected shape.
        reason: String,
    },

    /// A loaded value is out of range or inconsistent.
    #[error("{key}: {reason}")]
    Invalid {
        /// Dotted key, e.g. `server.listen_addr`.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// A value that loaded but cannot be used.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Malformed {
            format: "toml",
            message: err.message().to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            format: "json",
            message: err.to_string(),
        }
    }
}
