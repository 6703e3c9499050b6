//! Error types for transport providers.

use std::io;

use thiserror::Error;

/// Errors surfaced while creating, binding, or listening on a socket.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to create socket for {endpoint}: {source}")]
    Create {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure socket for {endpoint}: {source}")]
    Configure {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen on {endpoint}: {source}")]
    Listen {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("bind called before the socket address was resolved for {endpoint}")]
    Unresolved { endpoint: String },
    #[error("existing unix socket {path} is already in use")]
    UnixInUse { path: String },
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket { path: String },
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
}
