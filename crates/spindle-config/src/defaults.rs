use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::ListenEndpoint;

/// Default TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default ceiling on concurrently served connections.
pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Default readiness timeout in seconds; negative values block indefinitely.
pub const DEFAULT_TIMEOUT_SECS: i64 = -1;

/// Default size of a single socket read or write.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default listening endpoint for the server.
#[must_use]
pub fn default_listen_endpoint() -> ListenEndpoint {
    default_listen_endpoint_inner()
}

#[cfg(unix)]
fn default_listen_endpoint_inner() -> ListenEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("spindle");
    if apply_namespace {
        base.push(user_namespace());
    }

    ListenEndpoint::unix(base.join("spindled.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_listen_endpoint_inner() -> ListenEndpoint {
    ListenEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
