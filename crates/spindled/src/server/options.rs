use std::time::Duration;

use spindle_config::{Config, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CLIENTS};

/// Tunables for the connection multiplexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Number of connection slots; also the listen backlog.
    pub max_clients: usize,
    /// Readiness wait timeout; `None` blocks indefinitely.
    pub timeout: Option<Duration>,
    /// Sets `SO_REUSEADDR` on internet sockets.
    pub reuse_address: bool,
    /// Keeps connections open after an exchange.
    pub keep_alive: bool,
    /// Size of a single read or write; values below 1 are treated as 1.
    pub chunk_size: usize,
    /// Routes SIGINT and SIGTERM into a graceful shutdown.
    pub handle_signals: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            timeout: None,
            reuse_address: true,
            keep_alive: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            handle_signals: true,
        }
    }
}

impl ServerOptions {
    /// Derives options from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_clients: config.max_clients,
            timeout: config.timeout(),
            reuse_address: config.reuse_address,
            keep_alive: config.keep_alive,
            chunk_size: config.chunk_size,
            handle_signals: true,
        }
    }

    pub(crate) fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_carry_over() {
        let config = Config {
            max_clients: 3,
            timeout_secs: 5,
            keep_alive: false,
            chunk_size: 16,
            ..Config::default()
        };
        let options = ServerOptions::from_config(&config);
        assert_eq!(options.max_clients, 3);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert!(!options.keep_alive);
        assert_eq!(options.chunk_size, 16);
        assert!(options.handle_signals);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let options = ServerOptions {
            chunk_size: 0,
            ..ServerOptions::default()
        };
        assert_eq!(options.effective_chunk_size(), 1);
    }
}
