//! Self-pipe used to interrupt the readiness wait.
//!
//! SIGINT and SIGTERM write a byte into the pipe from the signal handler, as
//! does [`ShutdownHandle::shutdown`]. The read end is part of every poll set,
//! so the multiplexer wakes up and winds down.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use signal_hook::SigId;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use tracing::{info, warn};

const SHUTDOWN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shutdown");

/// Read end of the shutdown pipe plus the signal registrations feeding it.
#[derive(Debug)]
pub(crate) struct ShutdownSignal {
    reader: UnixStream,
    writer: Arc<UnixStream>,
    registrations: Vec<SigId>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> io::Result<Self> {
        let (reader, writer) = UnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;
        Ok(Self {
            reader,
            writer: Arc::new(writer),
            registrations: Vec::new(),
        })
    }

    /// Routes SIGINT and SIGTERM into the pipe.
    ///
    /// A signal that cannot be registered is logged and skipped.
    pub(crate) fn install_signal_handlers(&mut self) {
        for signal in [SIGINT, SIGTERM] {
            let registration = self
                .writer
                .try_clone()
                .and_then(|writer| signal_hook::low_level::pipe::register(signal, writer));
            match registration {
                Ok(id) => self.registrations.push(id),
                Err(error) => warn!(
                    target: SHUTDOWN_TARGET,
                    signal,
                    error = %error,
                    "failed to install signal handler"
                ),
            }
        }
    }

    pub(crate) fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            writer: Arc::clone(&self.writer),
        }
    }

    /// Consumes pending wake-up bytes, returning whether any were present.
    pub(crate) fn drain(&self) -> bool {
        let mut buffer = [0_u8; 64];
        let mut triggered = false;
        loop {
            match (&self.reader).read(&mut buffer) {
                Ok(0) => return triggered,
                Ok(_) => triggered = true,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return triggered,
            }
        }
    }
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.reader.as_fd()
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        for id in self.registrations.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// Requests a graceful stop of a running server from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    writer: Arc<UnixStream>,
}

impl ShutdownHandle {
    /// Wakes the server and asks it to close every connection and return.
    pub fn shutdown(&self) {
        info!(target: SHUTDOWN_TARGET, "shutdown requested");
        match (&*self.writer).write(&[1]) {
            Ok(_) => {}
            // A full pipe already holds a pending wake-up.
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
            Err(error) => warn!(
                target: SHUTDOWN_TARGET,
                error = %error,
                "failed to signal shutdown"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_wakes_the_reader() {
        let signal = ShutdownSignal::new().expect("create pipe");
        assert!(!signal.drain());
        let handle = signal.handle();
        handle.shutdown();
        handle.clone().shutdown();
        assert!(signal.drain());
        assert!(!signal.drain());
    }

    #[test]
    fn handle_outlives_the_signal() {
        let signal = ShutdownSignal::new().expect("create pipe");
        let handle = signal.handle();
        drop(signal);
        handle.shutdown();
    }
}
