//! Read handles that join a file while it is being written.

use super::state::{Shared, Watermark};
use crate::error::{PartylineError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often [`JoinReader::read_or_abort`] re-checks its abort condition.
const ABORT_POLL: Duration = Duration::from_millis(5);

/// A reader joined to a [`JoinableFile`](super::JoinableFile).
///
/// Reads start at offset 0 and never go past the committed watermark.
/// A read returning 0 means the writer closed and every byte was consumed.
pub struct JoinReader {
    id: u64,
    file: File,
    shared: Arc<Shared>,
    position: u64,
    timeout: Option<Duration>,
}

impl JoinReader {
    pub(super) fn open(shared: Arc<Shared>) -> Result<Self> {
        let file = File::open(shared.path()).map_err(|e| PartylineError::io(shared.path(), e))?;
        let timeout = shared.config().read_timeout();
        let id = shared.register_reader();
        tracing::debug!(path = %shared.path().display(), reader = id, "Reader joined");
        Ok(Self {
            id,
            file,
            shared,
            position: 0,
            timeout,
        })
    }

    /// Read the next committed bytes into `buf`, waiting if none are ready.
    ///
    /// Returns `Ok(0)` at end-of-stream, or `WaitExceeded` if a read
    /// timeout is configured and the writer stays silent that long.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.shared.wait_beyond(self.position, self.timeout)? {
            Watermark::Available(committed) => self.copy_upto(buf, committed),
            Watermark::EndOfStream => Ok(0),
        }
    }

    /// Like [`read`](Self::read), but gives up with `Ok(None)` once `abort`
    /// returns true.
    ///
    /// `abort` is checked before waiting and every few milliseconds while
    /// waiting. The configured read timeout still applies.
    pub fn read_or_abort(
        &mut self,
        buf: &mut [u8],
        abort: impl Fn() -> bool,
    ) -> Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let deadline = self.timeout.map(|t| Instant::now() + t);
        loop {
            if abort() {
                return Ok(None);
            }
            let slice = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(self.wait_exceeded());
                    }
                    left.min(ABORT_POLL)
                }
                None => ABORT_POLL,
            };
            match self.shared.wait_beyond(self.position, Some(slice)) {
                Ok(Watermark::Available(committed)) => {
                    return self.copy_upto(buf, committed).map(Some);
                }
                Ok(Watermark::EndOfStream) => return Ok(Some(0)),
                Err(PartylineError::WaitExceeded { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn wait_exceeded(&self) -> PartylineError {
        PartylineError::WaitExceeded {
            path: self.shared.path().to_path_buf(),
            timeout_ms: self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
        }
    }

    /// Like [`read`](Self::read) but never blocks.
    ///
    /// `Ok(None)` means the writer is still open and nothing new is committed.
    pub fn try_read(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        match self.shared.poll_beyond(self.position) {
            Some(Watermark::Available(committed)) => self.copy_upto(buf, committed).map(Some),
            Some(Watermark::EndOfStream) => Ok(Some(0)),
            None => Ok(None),
        }
    }

    /// Read up to `max` bytes as a fresh buffer. `None` at end-of-stream.
    pub fn read_chunk(&mut self, max: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; max.max(1)];
        let n = self.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    /// Read until end-of-stream.
    pub fn read_all(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let chunk = self.shared.config().chunk_size;
        let start = out.len();
        while let Some(bytes) = self.read_chunk(chunk)? {
            out.extend_from_slice(&bytes);
        }
        Ok(out.len() - start)
    }

    /// Copy committed bytes without holding the state lock.
    fn copy_upto(&mut self, buf: &mut [u8], committed: u64) -> Result<usize> {
        let available = committed.saturating_sub(self.position);
        let n = buf.len().min(available as usize);
        self.file
            .read_exact(&mut buf[..n])
            .map_err(|e| PartylineError::io(self.shared.path(), e))?;
        self.position += n as u64;
        Ok(n)
    }

    /// Offset of the next byte this reader will return.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current committed watermark of the file.
    pub fn committed(&self) -> u64 {
        self.shared.committed()
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// Leave the file. Other readers and the writer are unaffected.
    pub fn close(self) {}
}

impl Read for JoinReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        JoinReader::read(self, buf).map_err(std::io::Error::other)
    }
}

impl Drop for JoinReader {
    fn drop(&mut self) {
        self.shared.deregister_reader(self.id);
        tracing::debug!(
            path = %self.shared.path().display(),
            reader = self.id,
            position = self.position,
            "Reader closed"
        );
    }
}
