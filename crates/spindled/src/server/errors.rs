//! Error types for the server lifecycle.

use std::io;

use thiserror::Error;

use crate::render::PipelineError;
use crate::transport::TransportError;

/// Fatal errors that stop the server from starting or running.
///
/// Per-connection failures never surface here; they are reported through the
/// session hooks and the [`ServerReporter`](crate::ServerReporter).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be created.
    #[error("failed to create listening socket: {source}")]
    CreateSocket {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// The socket could not be configured or bound.
    #[error("failed to bind listening socket: {source}")]
    Bind {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// The socket could not be put into listening mode.
    #[error("failed to listen: {source}")]
    Listen {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
    /// The readiness wait failed with an error other than an interruption.
    #[error("readiness wait failed ({code}): {message}")]
    Readiness {
        /// OS error number.
        code: i32,
        /// OS error description.
        message: String,
    },
    /// The render pipeline could not be ordered.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The shutdown wake-up pipe could not be created.
    #[error("failed to create shutdown pipe: {source}")]
    ShutdownPipe {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
