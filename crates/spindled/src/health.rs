//! Structured reporting for server lifecycle and connection events.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use spindle_config::{Config, ListenEndpoint};

use crate::bootstrap::BootstrapError;
use crate::session::PeerAddress;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface server events to telemetry sinks.
pub trait ServerReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listening socket is ready.
    fn server_listening(&self, name: &str, endpoint: &ListenEndpoint, local: Option<SocketAddr>);

    /// Invoked when a connection occupies `slot`.
    fn connection_accepted(&self, peer: &PeerAddress, slot: usize);

    /// Invoked when the transport declines to create a session.
    fn connection_declined(&self, peer: &PeerAddress);

    /// Invoked when every slot is occupied and the pending connection is
    /// closed.
    fn connection_overflow(&self, peer: &PeerAddress, max_clients: usize);

    /// Invoked when reading from or writing to a peer fails.
    fn connection_failed(&self, peer: &PeerAddress, error: &io::Error);

    /// Invoked when a connection is torn down; `slot` is `None` for
    /// datagram exchanges.
    fn connection_dropped(&self, peer: &PeerAddress, slot: Option<usize>);

    /// Invoked when received bytes do not form a request.
    fn request_unparsed(&self, peer: &PeerAddress, bytes: usize);

    /// Invoked when a shutdown signal or request interrupts the loop.
    fn shutdown_requested(&self);

    /// Invoked after every connection is closed and the listener released.
    fn server_stopped(&self, name: &str);
}

impl<T> ServerReporter for Arc<T>
where
    T: ServerReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn server_listening(&self, name: &str, endpoint: &ListenEndpoint, local: Option<SocketAddr>) {
        (**self).server_listening(name, endpoint, local);
    }

    fn connection_accepted(&self, peer: &PeerAddress, slot: usize) {
        (**self).connection_accepted(peer, slot);
    }

    fn connection_declined(&self, peer: &PeerAddress) {
        (**self).connection_declined(peer);
    }

    fn connection_overflow(&self, peer: &PeerAddress, max_clients: usize) {
        (**self).connection_overflow(peer, max_clients);
    }

    fn connection_failed(&self, peer: &PeerAddress, error: &io::Error) {
        (**self).connection_failed(peer, error);
    }

    fn connection_dropped(&self, peer: &PeerAddress, slot: Option<usize>) {
        (**self).connection_dropped(peer, slot);
    }

    fn request_unparsed(&self, peer: &PeerAddress, bytes: usize) {
        (**self).request_unparsed(peer, bytes);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }

    fn server_stopped(&self, name: &str) {
        (**self).server_stopped(name);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredServerReporter;

impl StructuredServerReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ServerReporter for StructuredServerReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            max_clients = config.max_clients,
            parser = %config.parser,
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "server bootstrap failed"
        );
    }

    fn server_listening(&self, name: &str, endpoint: &ListenEndpoint, local: Option<SocketAddr>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_listening",
            server = name,
            endpoint = %endpoint,
            local_addr = ?local,
            "server listening"
        );
    }

    fn connection_accepted(&self, peer: &PeerAddress, slot: usize) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connection_accepted",
            peer = %peer,
            slot,
            "connection accepted"
        );
    }

    fn connection_declined(&self, peer: &PeerAddress) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_declined",
            peer = %peer,
            "transport declined connection"
        );
    }

    fn connection_overflow(&self, peer: &PeerAddress, max_clients: usize) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "connection_overflow",
            peer = %peer,
            max_clients,
            "maximum number of clients reached; closing connection"
        );
    }

    fn connection_failed(&self, peer: &PeerAddress, error: &io::Error) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "connection_failed",
            peer = %peer,
            error = %error,
            "connection i/o failed"
        );
    }

    fn connection_dropped(&self, peer: &PeerAddress, slot: Option<usize>) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "connection_dropped",
            peer = %peer,
            slot = ?slot,
            "connection dropped"
        );
    }

    fn request_unparsed(&self, peer: &PeerAddress, bytes: usize) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "request_unparsed",
            peer = %peer,
            bytes,
            "received data is not a request"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            "shutdown requested"
        );
    }

    fn server_stopped(&self, name: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            server = name,
            "server stopped"
        );
    }
}
