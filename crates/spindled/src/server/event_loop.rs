//! Readiness loop over the listener and the connection slots.

use std::net::SocketAddr;
use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, warn};

use crate::session::{PeerAddress, Session};
use crate::shutdown::{ShutdownHandle, ShutdownSignal};
use crate::transport::{ConnectionStream, ListenerSocket};

use super::io::{read_message, write_message};
use super::{SERVER_TARGET, Server, ServerError};

const MAX_DATAGRAM: usize = 65_507;

struct Slot {
    stream: ConnectionStream,
    session: Box<dyn Session>,
    peer: PeerAddress,
}

enum Outcome {
    Keep,
    Drop,
}

/// Server with an open listening socket.
///
/// Dropping a bound server without running it closes every connection and
/// releases the listener.
pub struct BoundServer {
    server: Server,
    listener: Option<ListenerSocket>,
    shutdown: ShutdownSignal,
    slots: Vec<Option<Slot>>,
}

impl BoundServer {
    pub(super) fn new(server: Server, listener: ListenerSocket, shutdown: ShutdownSignal) -> Self {
        let slots = std::iter::repeat_with(|| None)
            .take(server.options.max_clients)
            .collect();
        Self {
            server,
            listener: Some(listener),
            shutdown,
            slots,
        }
    }

    /// Internet address of the listener, when it has one.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(ListenerSocket::local_addr)
    }

    /// Handle that stops [`run`](Self::run) from another thread.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.handle()
    }

    /// The server configuration this listener serves.
    #[must_use]
    pub const fn server(&self) -> &Server {
        &self.server
    }

    /// Serves connections until shutdown is requested.
    ///
    /// On return every open connection has been torn down and the listener
    /// closed.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Readiness`] when the readiness wait fails for a
    /// reason other than an interrupting signal.
    pub fn run(mut self) -> Result<(), ServerError> {
        let result = self.serve();
        self.stop();
        result
    }

    fn serve(&mut self) -> Result<(), ServerError> {
        let timeout = poll_timeout(self.server.options.timeout);
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return Ok(());
            };

            let mut fds = Vec::with_capacity(self.slots.len() + 2);
            fds.push(PollFd::new(self.shutdown.as_fd(), PollFlags::POLLIN));
            fds.push(PollFd::new(listener.as_fd(), PollFlags::POLLIN));
            let mut polled = Vec::with_capacity(self.slots.len());
            for (index, slot) in self.slots.iter().enumerate() {
                if let Some(slot) = slot {
                    fds.push(PollFd::new(slot.stream.as_fd(), PollFlags::POLLIN));
                    polled.push(index);
                }
            }

            match poll(&mut fds, timeout) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(Errno::EINTR) => {
                    if self.shutdown.drain() {
                        self.server.reporter.shutdown_requested();
                        return Ok(());
                    }
                    continue;
                }
                Err(errno) => {
                    return Err(ServerError::Readiness {
                        code: errno as i32,
                        message: errno.desc().to_owned(),
                    });
                }
            }

            let shutdown_ready = fds.first().is_some_and(is_ready);
            let listener_ready = fds.get(1).is_some_and(is_ready);
            let ready_slots: Vec<usize> = polled
                .iter()
                .zip(fds.iter().skip(2))
                .filter(|(_, fd)| is_ready(fd))
                .map(|(index, _)| *index)
                .collect();
            drop(fds);

            if shutdown_ready {
                self.shutdown.drain();
                self.server.reporter.shutdown_requested();
                return Ok(());
            }
            if listener_ready {
                if listener.is_datagram() {
                    self.receive_datagram();
                } else {
                    self.accept_connection();
                }
            }
            for index in ready_slots {
                self.service(index);
            }
        }
    }

    fn accept_connection(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        let (stream, peer) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(
                    target: SERVER_TARGET,
                    error = %error,
                    "socket accept error"
                );
                return;
            }
        };

        let Some(index) = self.slots.iter().position(Option::is_none) else {
            self.server
                .reporter
                .connection_overflow(&peer, self.server.options.max_clients);
            drop(stream);
            return;
        };

        let Some(mut session) = self.server.transport.accept(&peer) else {
            self.server.reporter.connection_declined(&peer);
            drop(stream);
            return;
        };
        if let Some(configure) = &self.server.session_config {
            configure(session.as_mut());
        }

        self.server.reporter.connection_accepted(&peer, index);
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(Slot {
                stream,
                session,
                peer,
            });
        }
    }

    fn service(&mut self, index: usize) {
        let chunk_size = self.server.options.effective_chunk_size();
        let Some(slot) = self.slots.get_mut(index).and_then(Option::as_mut) else {
            return;
        };
        let Some(length) = slot.session.should_read(chunk_size) else {
            return;
        };

        let data = match read_message(&mut slot.stream, length) {
            Ok(data) => data,
            Err(error) => {
                self.server.reporter.connection_failed(&slot.peer, &error);
                slot.session.finish_transmission(None, false);
                self.teardown(index);
                return;
            }
        };
        if data.is_empty() {
            debug!(
                target: SERVER_TARGET,
                peer = %slot.peer,
                "peer closed the connection"
            );
            self.teardown(index);
            return;
        }

        let stream = &mut slot.stream;
        let outcome = exchange(
            &self.server,
            slot.session.as_mut(),
            &slot.peer,
            &data,
            |payload| write_message(stream, payload, chunk_size),
        );
        if matches!(outcome, Outcome::Drop) || !self.server.options.keep_alive {
            self.teardown(index);
        }
    }

    fn receive_datagram(&mut self) {
        let Some(ListenerSocket::Udp(socket)) = self.listener.as_ref() else {
            return;
        };
        let mut buffer = vec![0_u8; MAX_DATAGRAM];
        let (received, address) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(error) => {
                warn!(
                    target: SERVER_TARGET,
                    error = %error,
                    "datagram receive error"
                );
                return;
            }
        };
        let peer = PeerAddress::Inet(address);

        let Some(mut session) = self.server.transport.accept(&peer) else {
            self.server.reporter.connection_declined(&peer);
            return;
        };
        if let Some(configure) = &self.server.session_config {
            configure(session.as_mut());
        }

        let chunk_size = self.server.options.effective_chunk_size();
        if let Some(length) = session.should_read(chunk_size) {
            let data = buffer.get(..received.min(length)).unwrap_or_default();
            if !data.is_empty() {
                exchange(&self.server, session.as_mut(), &peer, data, |payload| {
                    socket.send_to(payload, address).map(|_| ())
                });
            }
        }

        self.server.reporter.connection_dropped(&peer, None);
        session.dropped_connection();
    }

    fn teardown(&mut self, index: usize) {
        let Some(mut slot) = self.slots.get_mut(index).and_then(Option::take) else {
            return;
        };
        self.server
            .reporter
            .connection_dropped(&slot.peer, Some(index));
        slot.session.dropped_connection();
    }

    fn stop(&mut self) {
        for index in 0..self.slots.len() {
            self.teardown(index);
        }
        if let Some(listener) = self.listener.take() {
            self.server.transport.close(listener);
            self.server.reporter.server_stopped(&self.server.name);
        }
    }
}

impl Drop for BoundServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Parses, dispatches, encodes, and writes one message.
fn exchange<W>(
    server: &Server,
    session: &mut dyn Session,
    peer: &PeerAddress,
    data: &[u8],
    write: W,
) -> Outcome
where
    W: FnOnce(&[u8]) -> std::io::Result<()>,
{
    let Some(request) = session.parse_request(data) else {
        server.reporter.request_unparsed(peer, data.len());
        session.finish_transmission(Some(data), false);
        return Outcome::Keep;
    };

    let response = server.handle_request(&request);
    let Some(payload) = session.stringify_response(response.as_ref()) else {
        session.finish_transmission(None, true);
        return Outcome::Keep;
    };

    match write(&payload) {
        Ok(()) => {
            session.finish_transmission(Some(&payload), true);
            Outcome::Keep
        }
        Err(error) => {
            server.reporter.connection_failed(peer, &error);
            session.finish_transmission(Some(&payload), false);
            Outcome::Drop
        }
    }
}

fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().is_some_and(|flags| {
        flags.intersects(
            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL,
        )
    })
}

fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    let Some(timeout) = timeout else {
        return PollTimeout::NONE;
    };
    i32::try_from(timeout.as_millis())
        .ok()
        .and_then(|millis| PollTimeout::try_from(millis).ok())
        .unwrap_or(PollTimeout::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_poll_timeout() {
        assert_eq!(poll_timeout(None), PollTimeout::NONE);
        assert_eq!(poll_timeout(Some(Duration::ZERO)), PollTimeout::ZERO);
        assert_eq!(
            poll_timeout(Some(Duration::from_secs(u64::MAX))),
            PollTimeout::MAX
        );
    }
}
