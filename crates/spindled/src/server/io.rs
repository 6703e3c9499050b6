//! Chunked reads and writes on accepted streams.

use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

/// Reads one message in chunks of `chunk_size` bytes.
///
/// Reading stops at a short chunk or when no further data is immediately
/// available; neither ends the connection. An empty result means the peer
/// hung up.
pub(crate) fn read_message<S>(stream: &mut S, chunk_size: usize) -> io::Result<Vec<u8>>
where
    S: Read + AsFd,
{
    let chunk_size = chunk_size.max(1);
    let mut message = Vec::new();
    let mut chunk = vec![0_u8; chunk_size];
    loop {
        let read = read_chunk_with_retry(stream, &mut chunk)?;
        message.extend_from_slice(chunk.get(..read).unwrap_or_default());
        if read < chunk_size || !has_pending_input(stream.as_fd())? {
            return Ok(message);
        }
    }
}

/// Writes `payload` in pieces of at most `chunk_size` bytes.
pub(crate) fn write_message<W>(stream: &mut W, payload: &[u8], chunk_size: usize) -> io::Result<()>
where
    W: Write,
{
    for piece in payload.chunks(chunk_size.max(1)) {
        stream.write_all(piece)?;
    }
    stream.flush()
}

fn read_chunk_with_retry<S: Read>(stream: &mut S, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn has_pending_input(fd: BorrowedFd<'_>) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    loop {
        match poll(&mut fds, PollTimeout::ZERO) {
            Ok(0) => return Ok(false),
            Ok(_) => {
                return Ok(fds.first().copied().and_then(PollFd::revents).is_some_and(|flags| {
                    flags.intersects(PollFlags::POLLIN | PollFlags::POLLHUP)
                }));
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from(errno)),
        }
    }
}
