//! Output collection from a subagent's merged stdout/stderr pipe.
//!
//! Two drains share one capped buffer:
//! - [`OutputCollector::drain_available`] reads whatever is buffered in the
//!   pipe without blocking, while the child is still running.
//! - [`OutputCollector::drain_to_eof`] reads until EOF and closes the pipe,
//!   once the child has been observed to exit.
//!
//! Bytes beyond the cap are read and discarded so that a chatty child never
//! stalls on a full pipe. Truncation is silent.

use std::io::{self, PipeReader, Read};

use nix::fcntl::{FcntlArg, OFlag, fcntl};
use tracing::trace;

/// Size of a single `read` from the pipe.
const READ_CHUNK: usize = 4096;

/// Capped output buffer fed from the read end of a pipe.
#[derive(Debug)]
pub struct OutputCollector {
    pipe: Option<PipeReader>,
    buffer: Vec<u8>,
    cap: usize,
}

impl OutputCollector {
    /// Create a collector that owns the read end of the pipe.
    pub const fn new(pipe: PipeReader, cap: usize) -> Self {
        Self {
            pipe: Some(pipe),
            buffer: Vec::new(),
            cap,
        }
    }

    /// Read everything currently available without blocking.
    ///
    /// Stops on would-block or EOF. The pipe is switched to non-blocking mode
    /// for the duration of the call and its previous flags are restored before
    /// returning. Returns the number of bytes appended to the buffer.
    pub fn drain_available(&mut self) -> io::Result<usize> {
        let Some(pipe) = self.pipe.as_ref() else {
            return Ok(0);
        };

        let flags = fcntl(pipe, FcntlArg::F_GETFL).map_err(io::Error::from)?;
        let original = OFlag::from_bits_truncate(flags);
        fcntl(pipe, FcntlArg::F_SETFL(original | OFlag::O_NONBLOCK)).map_err(io::Error::from)?;

        let mut reader = pipe;
        let result = read_capped(&mut reader, &mut self.buffer, self.cap, true);

        fcntl(pipe, FcntlArg::F_SETFL(original)).map_err(io::Error::from)?;

        let appended = result?;
        if appended > 0 {
            trace!(appended, total = self.buffer.len(), "Drained subagent output");
        }
        Ok(appended)
    }

    /// Read until EOF, then close the pipe.
    ///
    /// The pipe is closed even if the read fails. Calling this again after the
    /// pipe is closed is a no-op.
    pub fn drain_to_eof(&mut self) -> io::Result<()> {
        let Some(mut pipe) = self.pipe.take() else {
            return Ok(());
        };
        let result = read_capped(&mut pipe, &mut self.buffer, self.cap, false);
        drop(pipe);
        result.map(|appended| {
            trace!(appended, total = self.buffer.len(), "Collected trailing output");
        })
    }

    /// Whether the read end has been closed.
    pub const fn is_closed(&self) -> bool {
        self.pipe.is_none()
    }

    /// Number of bytes captured so far.
    pub const fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been captured.
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Move the captured bytes out, leaving an empty buffer behind.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

/// Read from `reader` into `buffer` until EOF (or would-block when
/// `nonblocking`), keeping at most `cap` bytes. Returns bytes appended.
fn read_capped(
    reader: &mut impl Read,
    buffer: &mut Vec<u8>,
    cap: usize,
    nonblocking: bool,
) -> io::Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    let mut appended = 0;

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buffer.len());
                let keep = n.min(room);
                buffer.extend_from_slice(&chunk[..keep]);
                appended += keep;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if nonblocking && e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }

    Ok(appended)
}
