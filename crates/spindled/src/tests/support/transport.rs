//! Transport wrapper handing out sessions that record their hooks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use socket2::Socket;
use spindle_config::ListenEndpoint;

use crate::parser::RequestParser;
use crate::request::Request;
use crate::session::{BasicSession, PeerAddress, Session};
use crate::transport::{ListenerSocket, TransportError, TransportProvider};

/// Hook invocations observed by a [`RecordingSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Finished {
        payload: Option<Vec<u8>>,
        success: bool,
    },
    Dropped,
}

/// Shared log of session hook invocations across all sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl SessionLog {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("session log mutex poisoned").clone()
    }

    pub fn wait_for(&self, predicate: impl Fn(&[SessionEvent]) -> bool) -> bool {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while std::time::Instant::now() < deadline {
            if predicate(&self.events()) {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        false
    }

    fn push(&self, event: SessionEvent) {
        self.events
            .lock()
            .expect("session log mutex poisoned")
            .push(event);
    }
}

/// Session delegating to [`BasicSession`] while recording hook calls.
pub struct RecordingSession {
    inner: BasicSession,
    log: SessionLog,
}

impl Session for RecordingSession {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn set_request_parser(&mut self, parser: Arc<dyn RequestParser>) {
        self.inner.set_request_parser(parser);
    }

    fn parse_request(&self, data: &[u8]) -> Option<Request> {
        self.inner.parse_request(data)
    }

    fn finish_transmission(&mut self, payload: Option<&[u8]>, success: bool) {
        self.log.push(SessionEvent::Finished {
            payload: payload.map(<[u8]>::to_vec),
            success,
        });
    }

    fn dropped_connection(&mut self) {
        self.log.push(SessionEvent::Dropped);
    }
}

/// Provider wrapper whose sessions record into a shared [`SessionLog`].
pub struct RecordingTransport {
    inner: Box<dyn TransportProvider>,
    log: SessionLog,
    decline: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new(inner: Box<dyn TransportProvider>, log: SessionLog) -> Self {
        Self {
            inner,
            log,
            decline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that makes `accept` refuse new sessions while set.
    pub fn decline_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.decline)
    }
}

impl TransportProvider for RecordingTransport {
    fn endpoint(&self) -> &ListenEndpoint {
        self.inner.endpoint()
    }

    fn create_socket(&mut self) -> Result<Socket, TransportError> {
        self.inner.create_socket()
    }

    fn configure_socket(&self, socket: &Socket, reuse_address: bool) -> Result<(), TransportError> {
        self.inner.configure_socket(socket, reuse_address)
    }

    fn bind_socket(&mut self, socket: &Socket) -> Result<(), TransportError> {
        self.inner.bind_socket(socket)
    }

    fn listen(&mut self, socket: Socket, backlog: usize) -> Result<ListenerSocket, TransportError> {
        self.inner.listen(socket, backlog)
    }

    fn accept(&self, peer: &PeerAddress) -> Option<Box<dyn Session>> {
        if self.decline.load(Ordering::SeqCst) {
            return None;
        }
        Some(Box::new(RecordingSession {
            inner: BasicSession::new(peer),
            log: self.log.clone(),
        }))
    }

    fn close(&mut self, listener: ListenerSocket) {
        self.inner.close(listener);
    }
}
