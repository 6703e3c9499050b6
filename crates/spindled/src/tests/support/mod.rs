//! Test harness utilities for the server behavioural suites.

mod config_loader;
mod harness;
mod reporter;
mod signals;
mod transport;

pub use config_loader::{TestConfigLoader, socket_path};
pub use harness::{CLIENT_TIMEOUT, RunningServer, echo_render, is_closed, round_trip, test_options};
pub use reporter::{RecordingReporter, ServerEvent};
pub use signals::signal_lock;
pub use transport::{SessionEvent, SessionLog};
