use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};

use camino::{Utf8Path, Utf8PathBuf};
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::warn;

use spindle_config::ListenEndpoint;

use super::{ListenerSocket, TRANSPORT_TARGET, TransportError, TransportProvider, backlog};

/// Local-domain stream provider bound to a filesystem path.
///
/// A stale socket file left behind by a previous process is removed before
/// binding; a socket that still accepts connections is reported as in use.
/// The socket file is removed again when the listener is closed.
#[derive(Debug)]
pub struct UnixTransport {
    endpoint: ListenEndpoint,
    path: Utf8PathBuf,
}

impl UnixTransport {
    /// Creates a provider for the socket at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        Self {
            endpoint: ListenEndpoint::unix(path.clone()),
            path,
        }
    }

    /// Filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl TransportProvider for UnixTransport {
    fn endpoint(&self) -> &ListenEndpoint {
        &self.endpoint
    }

    fn create_socket(&mut self) -> Result<Socket, TransportError> {
        Socket::new(Domain::UNIX, Type::STREAM, None).map_err(|source| TransportError::Create {
            endpoint: self.endpoint.to_string(),
            source,
        })
    }

    fn configure_socket(&self, _socket: &Socket, _reuse_address: bool) -> Result<(), TransportError> {
        Ok(())
    }

    fn bind_socket(&mut self, socket: &Socket) -> Result<(), TransportError> {
        remove_stale_socket(&self.path)?;
        let bind_error = |source| TransportError::Bind {
            endpoint: self.endpoint.to_string(),
            source,
        };
        let address = SockAddr::unix(self.path.as_std_path()).map_err(bind_error)?;
        socket.bind(&address).map_err(bind_error)
    }

    fn listen(&mut self, socket: Socket, max_clients: usize) -> Result<ListenerSocket, TransportError> {
        if let Err(source) = socket.listen(backlog(max_clients)) {
            remove_socket_file(&self.path);
            return Err(TransportError::Listen {
                endpoint: self.endpoint.to_string(),
                source,
            });
        }
        Ok(ListenerSocket::Unix(UnixListener::from(socket)))
    }

    fn close(&mut self, listener: ListenerSocket) {
        drop(listener);
        remove_socket_file(&self.path);
    }
}

fn remove_stale_socket(path: &Utf8Path) -> Result<(), TransportError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::UnixMetadata {
                path: path.to_string(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(TransportError::UnixNotSocket {
            path: path.to_string(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_stream) => Err(TransportError::UnixInUse {
            path: path.to_string(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            fs::remove_file(path).map_err(|source| TransportError::UnixCleanup {
                path: path.to_string(),
                source,
            })
        }
        Err(source) => Err(TransportError::UnixConnect {
            path: path.to_string(),
            source,
        }),
    }
}

fn remove_socket_file(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
