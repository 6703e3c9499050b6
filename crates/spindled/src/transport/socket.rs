//! Listening sockets and accepted streams.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::{UnixListener, UnixStream};

use crate::session::PeerAddress;

/// Listening primitive produced by a transport provider.
#[derive(Debug)]
pub enum ListenerSocket {
    /// Stream listener accepting TCP connections.
    Tcp(TcpListener),
    /// Stream listener accepting Unix domain connections.
    Unix(UnixListener),
    /// Datagram socket; each packet is an exchange of its own.
    Udp(UdpSocket),
}

impl ListenerSocket {
    /// Local internet address, when the socket has one.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            Self::Udp(socket) => socket.local_addr().ok(),
            Self::Unix(_) => None,
        }
    }

    /// Whether the socket is connectionless.
    #[must_use]
    pub const fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp(_))
    }

    pub(crate) fn accept(&self) -> io::Result<(ConnectionStream, PeerAddress)> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept()?;
                Ok((ConnectionStream::Tcp(stream), PeerAddress::Inet(peer)))
            }
            Self::Unix(listener) => {
                let (stream, peer) = listener.accept()?;
                let name = peer
                    .as_pathname()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                Ok((ConnectionStream::Unix(stream), PeerAddress::Unix(name)))
            }
            Self::Udp(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "datagram sockets do not accept connections",
            )),
        }
    }
}

impl AsFd for ListenerSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Tcp(listener) => listener.as_fd(),
            Self::Unix(listener) => listener.as_fd(),
            Self::Udp(socket) => socket.as_fd(),
        }
    }
}

/// Stream types accepted by the listener.
#[derive(Debug)]
pub enum ConnectionStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix domain connection.
    Unix(UnixStream),
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Unix(stream) => stream.flush(),
        }
    }
}

impl AsFd for ConnectionStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Tcp(stream) => stream.as_fd(),
            Self::Unix(stream) => stream.as_fd(),
        }
    }
}
