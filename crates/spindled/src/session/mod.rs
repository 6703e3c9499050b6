//! Per-connection policy objects.
//!
//! A session mediates between the raw transport and the render pipeline: it
//! decides how much to read, turns bytes into a [`Request`], encodes the
//! pipeline's [`Response`] and observes the outcome of every exchange.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::debug;

use crate::parser::RequestParser;
use crate::request::{PlainTextRequest, Request};
use crate::response::Response;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Callback applied to every session before it occupies a slot.
pub type SessionConfigurator = Arc<dyn Fn(&mut dyn Session) + Send + Sync>;

/// Contract consulted by the multiplexer for one connection or datagram.
pub trait Session: Send {
    /// Human readable identifier, usually derived from the peer address.
    fn name(&self) -> &str;

    /// Returns how many bytes to read this cycle, or `None` to defer.
    fn should_read(&mut self, chunk_size: usize) -> Option<usize> {
        Some(chunk_size)
    }

    /// Replaces the parser used by [`Session::parse_request`].
    fn set_request_parser(&mut self, parser: Arc<dyn RequestParser>);

    /// Parses a received message.
    fn parse_request(&self, data: &[u8]) -> Option<Request>;

    /// Encodes the pipeline result for the wire; `None` writes nothing.
    fn stringify_response(&mut self, response: Option<&Response>) -> Option<Vec<u8>> {
        response.and_then(Response::payload)
    }

    /// Observes the end of an exchange.
    fn finish_transmission(&mut self, payload: Option<&[u8]>, success: bool);

    /// Observes the teardown of the connection.
    fn dropped_connection(&mut self);
}

/// Peer identity as reported by the accepting socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// Internet peer.
    Inet(SocketAddr),
    /// Local-domain peer, usually unnamed.
    Unix(String),
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inet(address) => write!(f, "{address}"),
            Self::Unix(path) if path.is_empty() => f.write_str("unix:unnamed"),
            Self::Unix(path) => write!(f, "unix:{path}"),
        }
    }
}

/// Session used by the bundled transports.
///
/// Without a configured parser every message is passed through as a
/// plain-text request.
pub struct BasicSession {
    name: String,
    parser: Option<Arc<dyn RequestParser>>,
}

impl BasicSession {
    /// Creates a session named after `peer`.
    #[must_use]
    pub fn new(peer: &PeerAddress) -> Self {
        Self {
            name: peer.to_string(),
            parser: None,
        }
    }

    /// Builder variant of [`Session::set_request_parser`].
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn RequestParser>) -> Self {
        self.parser = Some(parser);
        self
    }
}

impl fmt::Debug for BasicSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicSession")
            .field("name", &self.name)
            .field("has_parser", &self.parser.is_some())
            .finish()
    }
}

impl Session for BasicSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_request_parser(&mut self, parser: Arc<dyn RequestParser>) {
        self.parser = Some(parser);
    }

    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        match &self.parser {
            Some(parser) => parser.parse_request(data),
            None => PlainTextRequest::from_bytes(data).map(Request::PlainText),
        }
    }

    fn finish_transmission(&mut self, payload: Option<&[u8]>, success: bool) {
        debug!(
            target: SESSION_TARGET,
            session = %self.name,
            bytes = payload.map_or(0, <[u8]>::len),
            success,
            "transmission finished"
        );
    }

    fn dropped_connection(&mut self) {
        debug!(
            target: SESSION_TARGET,
            session = %self.name,
            "connection dropped"
        );
    }
}
