//! Background server harness and client helpers.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::unix::thread::JoinHandleExt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::sys::pthread::pthread_kill;
use nix::sys::signal::Signal;

use crate::parser::{RequestParser, ShellRequestParser};
use crate::render::{CallbackRender, Render, StopToken};
use crate::request::Request;
use crate::response::Response;
use crate::server::{Server, ServerError, ServerOptions};
use crate::session::Session;
use crate::shutdown::ShutdownHandle;
use crate::transport::{TcpTransport, TransportProvider};

use super::reporter::RecordingReporter;
use super::transport::{RecordingTransport, SessionLog};

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Options for test servers; signal handling stays with the test runner.
pub fn test_options() -> ServerOptions {
    ServerOptions {
        handle_signals: false,
        ..ServerOptions::default()
    }
}

/// Render echoing shell requests as rejoined command lines and other
/// requests as their command.
pub fn echo_render() -> impl Render + 'static {
    CallbackRender::new(
        "echo",
        |request: &Request, _: Option<&mut Response>, _: &StopToken| match request {
            Request::Shell(shell) => Some(Response::text(shell.to_string())),
            other => Some(Response::text(other.command())),
        },
    )
}

/// Server running on a background thread.
pub struct RunningServer {
    pub address: Option<SocketAddr>,
    pub reporter: Arc<RecordingReporter>,
    pub sessions: SessionLog,
    pub decline: Arc<AtomicBool>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<Result<(), ServerError>>>,
}

impl RunningServer {
    /// Starts a shell-parsing echo server on an ephemeral TCP port.
    pub fn tcp(options: ServerOptions) -> Self {
        Self::start(
            Box::new(TcpTransport::new("127.0.0.1", 0)),
            options,
            Arc::new(ShellRequestParser),
            |server| server.with_render(echo_render()),
        )
    }

    /// Binds `transport` and serves on a background thread.
    pub fn start(
        transport: Box<dyn TransportProvider>,
        options: ServerOptions,
        parser: Arc<dyn RequestParser>,
        compose: impl FnOnce(Server) -> Server,
    ) -> Self {
        let sessions = SessionLog::default();
        let transport = RecordingTransport::new(transport, sessions.clone());
        let decline = transport.decline_flag();
        let reporter = Arc::new(RecordingReporter::default());
        let server = Server::new("test", Box::new(transport), options)
            .with_reporter(reporter.clone())
            .with_session_config(move |session: &mut dyn Session| {
                session.set_request_parser(Arc::clone(&parser));
            });
        let bound = compose(server).bind().expect("bind test server");
        let address = bound.local_addr();
        let shutdown = bound.shutdown_handle();
        let thread = thread::spawn(move || bound.run());
        Self {
            address,
            reporter,
            sessions,
            decline,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Connects a TCP client with read and write timeouts.
    pub fn connect(&self) -> TcpStream {
        let address = self.address.expect("server should listen on an inet address");
        let stream = TcpStream::connect(address).expect("connect client");
        stream
            .set_read_timeout(Some(CLIENT_TIMEOUT))
            .expect("set read timeout");
        stream
            .set_write_timeout(Some(CLIENT_TIMEOUT))
            .expect("set write timeout");
        stream
    }

    /// Delivers `signal` to the thread blocked in the event loop.
    pub fn signal(&self, signal: Signal) {
        let thread = self.thread.as_ref().expect("server thread running");
        pthread_kill(thread.as_pthread_t(), signal).expect("deliver signal");
    }

    /// Waits for the loop to return without requesting shutdown.
    pub fn join(mut self) -> Result<(), ServerError> {
        self.thread
            .take()
            .map_or(Ok(()), |thread| thread.join().expect("server thread panicked"))
    }

    /// Requests shutdown and waits for the loop to return.
    pub fn stop(mut self) -> Result<(), ServerError> {
        self.shutdown.shutdown();
        self.thread
            .take()
            .map_or(Ok(()), |thread| thread.join().expect("server thread panicked"))
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown.shutdown();
            let _ = thread.join();
        }
    }
}

/// Writes `request` and reads exactly the expected reply.
pub fn round_trip<S: Read + Write>(stream: &mut S, request: &str, expected: &str) {
    stream
        .write_all(request.as_bytes())
        .expect("write request");
    let mut reply = vec![0_u8; expected.len()];
    stream.read_exact(&mut reply).expect("read reply");
    assert_eq!(String::from_utf8_lossy(&reply), expected);
}

/// Whether the peer closed the stream.
pub fn is_closed<S: Read>(stream: &mut S) -> bool {
    let mut buffer = [0_u8; 16];
    match stream.read(&mut buffer) {
        Ok(0) => true,
        Err(error) => matches!(
            error.kind(),
            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
        ),
        Ok(_) => false,
    }
}
