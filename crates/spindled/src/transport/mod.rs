//! Transport providers for the listening socket.
//!
//! A provider owns the lifecycle of the listening primitive for one transport
//! kind: it creates and configures the socket, binds it, puts it into
//! listening mode, and turns each accepted peer into a [`Session`].

mod errors;
mod socket;
mod tcp;
mod udp;
mod unix;

use std::net::{SocketAddr, ToSocketAddrs};

use socket2::Socket;

use spindle_config::ListenEndpoint;

use crate::session::{BasicSession, PeerAddress, Session};

pub use self::errors::TransportError;
pub use self::socket::{ConnectionStream, ListenerSocket};
pub use self::tcp::TcpTransport;
pub use self::udp::UdpTransport;
pub use self::unix::UnixTransport;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Lifecycle of a listening socket for one transport kind.
///
/// The server calls the socket methods in order: `create_socket`,
/// `configure_socket`, `bind_socket`, `listen`, and finally `close` when it
/// stops.
pub trait TransportProvider: Send {
    /// Endpoint this provider serves.
    fn endpoint(&self) -> &ListenEndpoint;

    /// Creates the unbound socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the address cannot be resolved or the
    /// socket cannot be created.
    fn create_socket(&mut self) -> Result<Socket, TransportError>;

    /// Applies socket options before binding.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configure`] when an option is rejected.
    fn configure_socket(&self, socket: &Socket, reuse_address: bool) -> Result<(), TransportError> {
        socket
            .set_reuse_address(reuse_address)
            .map_err(|source| TransportError::Configure {
                endpoint: self.endpoint().to_string(),
                source,
            })
    }

    /// Binds the socket to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the address is unavailable.
    fn bind_socket(&mut self, socket: &Socket) -> Result<(), TransportError>;

    /// Turns the bound socket into a listener with the given backlog.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Listen`] when the socket refuses to listen.
    fn listen(&mut self, socket: Socket, backlog: usize) -> Result<ListenerSocket, TransportError>;

    /// Builds the session for a newly accepted peer; `None` rejects it.
    fn accept(&self, peer: &PeerAddress) -> Option<Box<dyn Session>> {
        Some(Box::new(BasicSession::new(peer)))
    }

    /// Releases the listener and any resources tied to the endpoint.
    fn close(&mut self, listener: ListenerSocket) {
        drop(listener);
    }
}

/// Builds the provider matching `endpoint`.
#[must_use]
pub fn transport_for(endpoint: &ListenEndpoint) -> Box<dyn TransportProvider> {
    match endpoint {
        ListenEndpoint::Tcp { host, port } => Box::new(TcpTransport::new(host.clone(), *port)),
        ListenEndpoint::Udp { host, port } => Box::new(UdpTransport::new(host.clone(), *port)),
        ListenEndpoint::Unix { path } => Box::new(UnixTransport::new(path.clone())),
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| TransportError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })
}

fn backlog(max_clients: usize) -> i32 {
    i32::try_from(max_clients).unwrap_or(i32::MAX)
}
