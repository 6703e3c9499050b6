use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Declarative configuration for the listening socket.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ListenEndpoint {
    /// Connection-oriented TCP endpoint.
    Tcp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind; `0` requests an ephemeral port.
        port: u16,
    },
    /// Connectionless UDP endpoint.
    Udp {
        /// Host name or address to bind.
        host: String,
        /// Port to bind; `0` requests an ephemeral port.
        port: u16,
    },
    /// Unix domain stream socket bound to a filesystem path.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
}

impl ListenEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Builds a UDP endpoint.
    #[must_use]
    pub fn udp(host: impl Into<String>, port: u16) -> Self {
        Self::Udp {
            host: host.into(),
            port,
        }
    }

    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Returns the socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } | Self::Udp { .. } => None,
        }
    }

    /// Reports whether the endpoint is connectionless.
    #[must_use]
    pub const fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp { .. })
    }

    /// Ensures the socket's parent directory exists with restrictive permissions.
    ///
    /// # Errors
    ///
    /// Returns [`SocketPreparationError`] when the path has no parent or the
    /// directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
            Self::Udp { host, port } => write!(formatter, "udp://{host}:{port}"),
            Self::Unix { path } => write!(formatter, "unix://{path}"),
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(EndpointParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::unix(path))
            }
            scheme @ ("tcp" | "udp") => {
                let host = url
                    .host_str()
                    .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
                if scheme == "tcp" {
                    Ok(Self::tcp(host, port))
                } else {
                    Ok(Self::udp(host, port))
                }
            }
            other => Err(EndpointParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing from the address.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Parent directory is missing when creating a Unix socket path.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn display_unix_socket() {
        let endpoint = ListenEndpoint::unix(Utf8PathBuf::from("/tmp/spindle.sock"));
        assert_eq!(endpoint.to_string(), "unix:///tmp/spindle.sock");
    }

    #[rstest]
    #[case("tcp://127.0.0.1:9000", ListenEndpoint::tcp("127.0.0.1", 9000))]
    #[case("udp://127.0.0.1:9001", ListenEndpoint::udp("127.0.0.1", 9001))]
    #[case("unix:///run/spindle.sock", ListenEndpoint::unix("/run/spindle.sock"))]
    fn parses_endpoints(#[case] input: &str, #[case] expected: ListenEndpoint) {
        let endpoint: ListenEndpoint = input.parse().expect("endpoint should parse");
        assert_eq!(endpoint, expected);
    }

    #[rstest]
    #[case("tcp://127.0.0.1")]
    #[case("http://127.0.0.1:80")]
    fn rejects_incomplete_or_foreign_endpoints(#[case] input: &str) {
        assert!(input.parse::<ListenEndpoint>().is_err());
    }

    #[test]
    fn only_udp_is_datagram() {
        assert!(ListenEndpoint::udp("localhost", 1).is_datagram());
        assert!(!ListenEndpoint::tcp("localhost", 1).is_datagram());
    }

    #[test]
    fn prepares_unix_socket_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("spindle.sock");
        let endpoint = ListenEndpoint::unix(path.to_str().expect("utf8 path"));
        endpoint.prepare_filesystem().expect("prepare filesystem");
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn rejects_unix_socket_without_parent() {
        let endpoint = ListenEndpoint::unix("spindle.sock");
        let error = endpoint
            .prepare_filesystem()
            .expect_err("bare file name has no parent");
        assert!(matches!(error, SocketPreparationError::MissingParent { .. }));
    }
}
