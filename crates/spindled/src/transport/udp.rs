use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use spindle_config::ListenEndpoint;

use super::{ListenerSocket, TransportError, TransportProvider, resolve};

/// Connectionless provider bound to a UDP address.
///
/// Datagram sockets skip the listen step; every received packet is handled
/// by a session of its own.
#[derive(Debug)]
pub struct UdpTransport {
    endpoint: ListenEndpoint,
    address: Option<SocketAddr>,
}

impl UdpTransport {
    /// Creates a provider for `host:port`; port `0` picks an ephemeral port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            endpoint: ListenEndpoint::udp(host, port),
            address: None,
        }
    }
}

impl TransportProvider for UdpTransport {
    fn endpoint(&self) -> &ListenEndpoint {
        &self.endpoint
    }

    fn create_socket(&mut self) -> Result<Socket, TransportError> {
        let ListenEndpoint::Udp { host, port } = &self.endpoint else {
            return Err(TransportError::Unresolved {
                endpoint: self.endpoint.to_string(),
            });
        };
        let address = resolve(host, *port)?;
        let socket = Socket::new(Domain::for_address(address), Type::DGRAM, Some(Protocol::UDP))
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

    fn listen(&mut self, socket: Socket, _max_clients: usize) -> Result<ListenerSocket, TransportError> {
        Ok(ListenerSocket::Udp(UdpSocket::from(socket)))
    }
}
