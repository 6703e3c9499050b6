//! Test configuration loaders for scenarios covering success and failure paths.

use camino::Utf8PathBuf;
use tempfile::TempDir;

use spindle_config::{Config, ConfigError, ListenEndpoint, LogFormat};

use crate::bootstrap::ConfigLoader;

/// Path of a socket file inside `dir`.
pub fn socket_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("temporary socket path was not UTF-8")
}

/// Loader returning a fixed configuration, validated like the system
/// loader.
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    /// Listens on a Unix socket nested below `dir`, so bootstrap has to
    /// create the parent directory.
    pub fn unix(dir: &TempDir) -> Self {
        let path = socket_path(dir, "run/spindled.sock");
        Self::with(Config {
            listen: ListenEndpoint::unix(path),
            ..Self::base()
        })
    }

    /// Listens on an ephemeral TCP port.
    pub fn tcp() -> Self {
        Self::with(Config {
            listen: ListenEndpoint::tcp("127.0.0.1", 0),
            ..Self::base()
        })
    }

    pub fn with(config: Config) -> Self {
        Self { config }
    }

    fn base() -> Config {
        Config {
            log_format: LogFormat::Compact,
            log_filter: "spindled=debug".to_owned(),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}
