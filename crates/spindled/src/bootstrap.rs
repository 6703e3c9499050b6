//! Server bootstrap orchestration.

use std::sync::Arc;

use thiserror::Error;

use spindle_config::{Config, ConfigError, SocketPreparationError};

use crate::health::ServerReporter;
use crate::parser::parser_for;
use crate::server::{Server, ServerOptions};
use crate::session::Session;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::transport_for;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a layer fails to load or a value is out
    /// of range.
    fn load(&self) -> Result<Config, ConfigError>;
}

/// Loader that delegates to [`Config::load_validated`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        Config::load_validated()
    }
}

/// Loader returning a fixed configuration after validating it.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare listening socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn ServerReporter>,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Settings of the installed log subscriber.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Builds a server for the configured endpoint.
    ///
    /// Sessions receive the configured request parser and the server reports
    /// through the bootstrap reporter. Renders are registered by the caller.
    #[must_use]
    pub fn into_server(self, name: impl Into<String>) -> Server {
        let parser = parser_for(self.config.parser);
        Server::new(
            name,
            transport_for(self.config.listen()),
            ServerOptions::from_config(&self.config),
        )
        .with_reporter(self.reporter)
        .with_session_config(move |session: &mut dyn Session| {
            session.set_request_parser(Arc::clone(&parser));
        })
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration, telemetry, or socket
/// preparation fails; the failure is also passed to the reporter.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn ServerReporter>,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = config.listen().prepare_filesystem() {
        let error = BootstrapError::Socket { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    reporter.bootstrap_succeeded(&config);
    Ok(Bootstrapped {
        config,
        telemetry,
        reporter,
    })
}
