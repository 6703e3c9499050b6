//! Readiness-multiplexed socket request server.
//!
//! Spindle accepts connections over TCP, UDP, or Unix domain sockets, parses
//! each received message into a [`Request`], runs it through a
//! dependency-ordered [`RenderPipeline`], and writes the encoded
//! [`Response`] back to the peer.
//!
//! The server is single-threaded. A [`BoundServer`] keeps a fixed table of
//! connection slots and services the listener, every occupied slot, and a
//! shutdown wake-up pipe from one blocking `poll(2)` call. Each connection
//! owns a [`Session`] that controls how much is read, how bytes become a
//! request, and how the response is encoded. SIGINT, SIGTERM, or a
//! [`ShutdownHandle`] close every connection and return from
//! [`BoundServer::run`].
//!
//! The binary wires these pieces from layered configuration: see
//! [`bootstrap_with`] and [`spindle_config::Config`].

mod bootstrap;
mod health;
pub mod parser;
mod render;
mod request;
mod response;
mod server;
mod session;
mod shutdown;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{ServerReporter, StructuredServerReporter};
pub use parser::{RequestParser, parser_for};
pub use render::{CallbackRender, PipelineError, Render, RenderPipeline, StopToken};
pub use request::{
    MapKey, PlainTextRequest, Request, SerializedRequest, SerializedValue, ShellRequest,
};
pub use response::{JsonResponse, Response};
pub use server::{BoundServer, Server, ServerError, ServerOptions};
pub use session::{BasicSession, PeerAddress, Session, SessionConfigurator};
pub use shutdown::ShutdownHandle;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{TcpTransport, TransportError, TransportProvider, UdpTransport, UnixTransport};

#[cfg(test)]
mod tests;
