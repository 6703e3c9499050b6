//! Connection multiplexer.
//!
//! A [`Server`] owns a transport provider, the render pipeline, and the
//! options that shape its event loop. Binding produces a [`BoundServer`] that
//! owns the listening socket and a fixed table of connection slots, serviced
//! from a single blocking `poll(2)` call.

mod errors;
mod event_loop;
mod io;
mod options;

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::health::{ServerReporter, StructuredServerReporter};
use crate::render::{Render, RenderPipeline};
use crate::request::Request;
use crate::response::Response;
use crate::session::{Session, SessionConfigurator};
use crate::shutdown::ShutdownSignal;
use crate::transport::TransportProvider;

pub use self::errors::ServerError;
pub use self::event_loop::BoundServer;
pub use self::options::ServerOptions;

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Request server composed of a transport, renders, and loop options.
///
/// ```rust,no_run
/// use spindled::{CallbackRender, Request, Response, Server, ServerOptions, TcpTransport};
///
/// # fn main() -> Result<(), spindled::ServerError> {
/// Server::new("echo", Box::new(TcpTransport::new("127.0.0.1", 9780)), ServerOptions::default())
///     .with_render(CallbackRender::new("echo", |request: &Request, _, _| {
///         Some(Response::text(request.command()))
///     }))
///     .run()
/// # }
/// ```
pub struct Server {
    name: String,
    transport: Box<dyn TransportProvider>,
    options: ServerOptions,
    pipeline: RenderPipeline,
    reporter: Arc<dyn ServerReporter>,
    session_config: Option<SessionConfigurator>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("endpoint", self.transport.endpoint())
            .field("options", &self.options)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server with an empty pipeline and the structured reporter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        transport: Box<dyn TransportProvider>,
        options: ServerOptions,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            options,
            pipeline: RenderPipeline::new(),
            reporter: Arc::new(StructuredServerReporter::new()),
            session_config: None,
        }
    }

    /// Name used in telemetry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loop options.
    #[must_use]
    pub const fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Registers a render under its own name without extra dependencies.
    #[must_use]
    pub fn with_render<R>(mut self, render: R) -> Self
    where
        R: Render + 'static,
    {
        self.pipeline.add(render, None, &[]);
        self
    }

    /// The render pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Mutable access to the render pipeline for named or dependent
    /// registrations.
    pub fn pipeline_mut(&mut self) -> &mut RenderPipeline {
        &mut self.pipeline
    }

    /// Replaces the reporter receiving lifecycle events.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ServerReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Installs a callback applied to every new session before it is used.
    #[must_use]
    pub fn with_session_config<F>(mut self, configure: F) -> Self
    where
        F: Fn(&mut dyn Session) + Send + Sync + 'static,
    {
        self.session_config = Some(Arc::new(configure));
        self
    }

    /// Runs `request` through the render pipeline.
    ///
    /// Returns `None` when no render produced a response, or when the
    /// pipeline cannot be ordered (logged as an error).
    pub fn handle_request(&self, request: &Request) -> Option<Response> {
        match self.pipeline.dispatch(request) {
            Ok(response) => response,
            Err(pipeline_error) => {
                error!(
                    target: SERVER_TARGET,
                    server = %self.name,
                    error = %pipeline_error,
                    "render pipeline cannot be resolved"
                );
                None
            }
        }
    }

    /// Validates the pipeline and opens the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the pipeline has a configuration error or
    /// the socket cannot be created, bound, or put into listening mode.
    pub fn bind(mut self) -> Result<BoundServer, ServerError> {
        self.pipeline.resolve()?;

        let mut shutdown =
            ShutdownSignal::new().map_err(|source| ServerError::ShutdownPipe { source })?;
        if self.options.handle_signals {
            shutdown.install_signal_handlers();
        }

        let socket = self
            .transport
            .create_socket()
            .map_err(|source| ServerError::CreateSocket { source })?;
        self.transport
            .configure_socket(&socket, self.options.reuse_address)
            .map_err(|source| ServerError::Bind { source })?;
        self.transport
            .bind_socket(&socket)
            .map_err(|source| ServerError::Bind { source })?;
        let listener = self
            .transport
            .listen(socket, self.options.max_clients)
            .map_err(|source| ServerError::Listen { source })?;

        info!(
            target: SERVER_TARGET,
            server = %self.name,
            endpoint = %self.transport.endpoint(),
            max_clients = self.options.max_clients,
            "listening socket ready"
        );
        self.reporter
            .server_listening(&self.name, self.transport.endpoint(), listener.local_addr());
        Ok(BoundServer::new(self, listener, shutdown))
    }

    /// Binds and serves until a shutdown signal or request arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] on startup failures or a fatal readiness
    /// error.
    pub fn run(self) -> Result<(), ServerError> {
        self.bind()?.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{CallbackRender, StopToken};
    use crate::request::PlainTextRequest;
    use crate::transport::TcpTransport;

    fn server() -> Server {
        Server::new(
            "test",
            Box::new(TcpTransport::new("127.0.0.1", 0)),
            ServerOptions {
                handle_signals: false,
                ..ServerOptions::default()
            },
        )
    }

    fn request(text: &str) -> Request {
        Request::from(PlainTextRequest::from_bytes(text.as_bytes()).expect("request"))
    }

    #[test]
    fn handle_request_runs_the_pipeline() {
        let server = server().with_render(CallbackRender::new(
            "upper",
            |request: &Request, _: Option<&mut Response>, _: &StopToken| {
                Some(Response::text(request.command().to_uppercase()))
            },
        ));
        assert_eq!(
            server.handle_request(&request("ping")),
            Some(Response::text("PING"))
        );
    }

    #[test]
    fn handle_request_without_renders_is_empty() {
        assert!(server().handle_request(&request("ping")).is_none());
    }

    #[test]
    fn bind_rejects_unresolvable_pipeline() {
        let mut server = server();
        server.pipeline_mut().add(
            CallbackRender::new("a", |_: &Request, _: Option<&mut Response>, _: &StopToken| None),
            None,
            &["missing"],
        );
        assert!(matches!(server.bind(), Err(ServerError::Pipeline(_))));
    }

    #[test]
    fn bind_reports_unresolvable_host() {
        let server = Server::new(
            "test",
            Box::new(TcpTransport::new("host.invalid", 0)),
            ServerOptions {
                handle_signals: false,
                ..ServerOptions::default()
            },
        );
        assert!(matches!(
            server.bind(),
            Err(ServerError::CreateSocket { .. })
        ));
    }
}
