//! Log subscriber installation for the server process.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use spindle_config::{Config, LogFormat};

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Settings of the process-wide subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    filter: String,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Filter expression the subscriber was built with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// The first configuration wins; later calls return the handle describing
/// the subscriber that is already installed.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter expression is invalid or a
/// foreign subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).cloned()
}

fn install(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    tracing::subscriber::set_global_default(subscriber_for(config.log_format(), filter))?;
    Ok(TelemetryHandle {
        format: config.log_format(),
        filter: config.log_filter().to_owned(),
    })
}

fn parse_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

/// Builds the stderr subscriber for `format`; colour only on a terminal.
fn subscriber_for(format: LogFormat, filter: EnvFilter) -> BoxedSubscriber {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!format.is_structured() && io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_file(format.shows_source_location())
        .with_line_number(format.shows_source_location());
    match format {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().with_target(true).finish()),
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn invalid_filter_names_the_expression() {
        let Err(error) = parse_filter("spindled=[") else {
            panic!("unbalanced bracket must not parse");
        };
        assert!(matches!(
            &error,
            TelemetryError::Filter { filter, .. } if filter == "spindled=["
        ));
        assert!(error.to_string().contains("spindled=["));
    }

    #[rstest]
    #[case(LogFormat::Json)]
    #[case(LogFormat::Compact)]
    #[case(LogFormat::Pretty)]
    fn every_format_builds_a_usable_subscriber(#[case] format: LogFormat) {
        let filter = parse_filter("spindled=debug").expect("filter parses");
        let subscriber = subscriber_for(format, filter);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "spindled::telemetry", %format, "subscriber ready");
        });
    }
}
