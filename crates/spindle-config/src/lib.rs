//! Shared configuration for the Spindle socket server.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, a TOML
//! file (`--config-path` or `SPINDLE_CONFIG_PATH`), `SPINDLE_*` environment
//! variables, and finally command-line flags. The resolved [`Config`] drives
//! the listening endpoint, the multiplexer limits, the request parser
//! installed on new sessions, and the telemetry subscriber.

mod defaults;
mod logging;
mod parser;
mod socket;

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CHUNK_SIZE, DEFAULT_LOG_FILTER, DEFAULT_MAX_CLIENTS, DEFAULT_TCP_PORT,
    DEFAULT_TIMEOUT_SECS, default_listen_endpoint, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use parser::ParserKind;
pub use socket::{EndpointParseError, ListenEndpoint, SocketPreparationError};

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SPINDLE")]
pub struct Config {
    /// Endpoint the server listens on.
    #[ortho_config(default = default_listen_endpoint())]
    pub listen: ListenEndpoint,
    /// Maximum number of concurrently served connections.
    #[ortho_config(default = DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,
    /// Readiness wait timeout in whole seconds; negative blocks indefinitely.
    #[ortho_config(default = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: i64,
    /// Whether `SO_REUSEADDR` is set on the listening socket.
    #[ortho_config(default = true)]
    pub reuse_address: bool,
    /// Whether connections stay open after an exchange.
    #[ortho_config(default = true)]
    pub keep_alive: bool,
    /// Size of a single socket read or write in bytes.
    #[ortho_config(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Request parser installed on accepted sessions.
    #[ortho_config(default = ParserKind::Shell)]
    pub parser: ParserKind,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            max_clients: DEFAULT_MAX_CLIENTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            reuse_address: true,
            keep_alive: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parser: ParserKind::default(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from all layers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer cannot be read or merged and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load().map_err(ConfigError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::invalid("max_clients", "must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("chunk_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Endpoint the server listens on.
    #[must_use]
    pub const fn listen(&self) -> &ListenEndpoint {
        &self.listen
    }

    /// Readiness wait timeout; `None` blocks indefinitely.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_secs)
            .ok()
            .map(Duration::from_secs)
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One of the configuration layers failed to load.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// A value was outside its permitted range.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Human-readable constraint.
        reason: &'static str,
    },
}

impl ConfigError {
    const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}
