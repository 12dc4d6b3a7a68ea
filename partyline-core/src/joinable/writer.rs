//! The single write handle of a joinable file.

use super::JoinableFile;
use super::state::Shared;
use crate::error::{PartylineError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Exclusive write access to a [`JoinableFile`].
///
/// Bytes become visible to readers only after [`write`](Self::write)
/// returns. Dropping an unclosed writer closes it.
pub struct JoinWriter {
    file: Option<File>,
    shared: Arc<Shared>,
    committed: u64,
}

impl JoinWriter {
    pub(super) fn new(file: File, shared: Arc<Shared>) -> Self {
        let committed = shared.committed();
        Self {
            file: Some(file),
            shared,
            committed,
        }
    }

    /// Append `bytes` and commit them. Returns the new watermark.
    ///
    /// If the append or sync fails, the file is cut back to the committed
    /// length and the writer closes: readers get end-of-stream after the
    /// last good commit and later writes fail with `WriterClosed`.
    pub fn write(&mut self, bytes: &[u8]) -> Result<u64> {
        let Some(file) = self.file.as_mut() else {
            return Err(PartylineError::WriterClosed {
                path: self.shared.path().to_path_buf(),
            });
        };
        if bytes.is_empty() {
            return Ok(self.committed);
        }

        let mut appended = file.write_all(bytes);
        if appended.is_ok() && self.shared.config().sync_on_write {
            appended = file.sync_data();
        }
        if let Err(e) = appended {
            let err = PartylineError::io(self.shared.path(), e);
            self.abandon(&err);
            return Err(err);
        }

        self.committed = self.shared.commit(bytes.len() as u64);
        tracing::trace!(
            path = %self.shared.path().display(),
            len = bytes.len(),
            committed = self.committed,
            "Committed write"
        );
        Ok(self.committed)
    }

    /// Drop uncommitted bytes from a failed write and close.
    fn abandon(&mut self, cause: &PartylineError) {
        if let Some(file) = self.file.as_ref() {
            if let Err(e) = file.set_len(self.committed) {
                tracing::warn!(
                    path = %self.shared.path().display(),
                    error = %e,
                    "Could not cut back failed write"
                );
            }
        }
        tracing::error!(
            path = %self.shared.path().display(),
            committed = self.committed,
            error = %cause,
            "Write failed; closing writer"
        );
        if let Err(e) = self.finish() {
            tracing::warn!(path = %self.shared.path().display(), error = %e, "Close after failed write");
        }
    }

    /// Sync written bytes to disk.
    pub fn flush(&mut self) -> Result<()> {
        let path = self.shared.path();
        match self.file.as_mut() {
            Some(file) => file.sync_data().map_err(|e| PartylineError::io(path, e)),
            None => Ok(()),
        }
    }

    /// Bytes committed through this handle so far.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// Shared handle for joining readers.
    pub fn file(&self) -> JoinableFile {
        JoinableFile::from_shared(Arc::clone(&self.shared))
    }

    /// Close for writing. Joined readers drain what is left, then see end-of-stream.
    pub fn close(mut self) -> Result<u64> {
        self.finish()
    }

    fn finish(&mut self) -> Result<u64> {
        let Some(file) = self.file.take() else {
            return Ok(self.committed);
        };

        let unlocked = if self.shared.config().os_lock {
            fs2::FileExt::unlock(&file)
        } else {
            Ok(())
        };
        drop(file);

        let committed = self.shared.close_writer();
        tracing::debug!(
            path = %self.shared.path().display(),
            committed,
            readers = self.shared.reader_count(),
            "Writer closed"
        );

        unlocked.map_err(|e| PartylineError::io(self.shared.path(), e))?;
        Ok(committed)
    }
}

impl Write for JoinWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        JoinWriter::write(self, buf).map_err(std::io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        JoinWriter::flush(self).map_err(std::io::Error::other)
    }
}

impl Drop for JoinWriter {
    fn drop(&mut self) {
        if self.file.is_some() {
            tracing::warn!(
                path = %self.shared.path().display(),
                committed = self.committed,
                "Writer dropped without close"
            );
            let _ = self.finish();
        }
    }
}
