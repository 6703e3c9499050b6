//! Test double for [`ServerReporter`] that records structured events for assertions.

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use spindle_config::{Config, ListenEndpoint};

use crate::bootstrap::BootstrapError;
use crate::health::ServerReporter;
use crate::session::PeerAddress;

/// Structured server events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    Listening,
    Accepted(usize),
    Declined,
    Overflow(usize),
    Failed,
    Dropped(Option<usize>),
    Unparsed(usize),
    ShutdownRequested,
    Stopped,
}

/// Records server events for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ServerEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ServerEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ServerEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    /// Polls until `predicate` matches at least `expected` events.
    pub fn wait_for(&self, expected: usize, predicate: impl Fn(&ServerEvent) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if self.count(&predicate) >= expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn record(&self, event: ServerEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl ServerReporter for RecordingReporter {
    fn bootstrap_starting(&self) {
        self.record(ServerEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(ServerEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(ServerEvent::BootstrapFailed(error.to_string()));
    }

    fn server_listening(&self, _name: &str, _endpoint: &ListenEndpoint, _local: Option<SocketAddr>) {
        self.record(ServerEvent::Listening);
    }

    fn connection_accepted(&self, _peer: &PeerAddress, slot: usize) {
        self.record(ServerEvent::Accepted(slot));
    }

    fn connection_declined(&self, _peer: &PeerAddress) {
        self.record(ServerEvent::Declined);
    }

    fn connection_overflow(&self, _peer: &PeerAddress, max_clients: usize) {
        self.record(ServerEvent::Overflow(max_clients));
    }

    fn connection_failed(&self, _peer: &PeerAddress, _error: &io::Error) {
        self.record(ServerEvent::Failed);
    }

    fn connection_dropped(&self, _peer: &PeerAddress, slot: Option<usize>) {
        self.record(ServerEvent::Dropped(slot));
    }

    fn request_unparsed(&self, _peer: &PeerAddress, bytes: usize) {
        self.record(ServerEvent::Unparsed(bytes));
    }

    fn shutdown_requested(&self) {
        self.record(ServerEvent::ShutdownRequested);
    }

    fn server_stopped(&self, _name: &str) {
        self.record(ServerEvent::Stopped);
    }
}
