use std::net::{SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

use spindle_config::ListenEndpoint;

use super::{ListenerSocket, TransportError, TransportProvider, backlog, resolve};

/// Connection-oriented provider listening on a TCP address.
#[derive(Debug)]
pub struct TcpTransport {
    endpoint: ListenEndpoint,
    address: Option<SocketAddr>,
}

impl TcpTransport {
    /// Creates a provider for `host:port`; port `0` picks an ephemeral port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: ListenEndpoint::tcp(host, port),
            address: None,
        }
    }
}

impl TransportProvider for TcpTransport {
    fn endpoint(&self) -> &ListenEndpoint {
        &self.endpoint
    }

    fn create_socket(&mut self) -> Result<Socket, TransportError> {
        let ListenEndpoint::Tcp { host, port } = &self.endpoint else {
            return Err(TransportError::Unresolved {
                endpoint: self.endpoint.to_string(),
            });
        };
        let address = resolve(host, *port)?;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| TransportError::Create {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        self.address = Some(address);
        Ok(socket)
    }

    fn bind_socket(&mut self, socket: &Socket) -> Result<(), TransportError> {
        let address = self.address.ok_or_else(|| TransportError::Unresolved {
            endpoint: self.endpoint.to_string(),
        })?;
        socket
            .bind(&address.into())
            .map_err(|source| TransportError::Bind {
                endpoint: self.endpoint.to_string(),
                source,
            })
    }

    fn listen(&mut self, socket: Socket, max_clients: usize) -> Result<ListenerSocket, TransportError> {
        socket
            .listen(backlog(max_clients))
            .map_err(|source| TransportError::Listen {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        Ok(ListenerSocket::Tcp(TcpListener::from(socket)))
    }
}
