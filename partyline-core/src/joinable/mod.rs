//! Single-writer, multi-reader files that can be joined mid-write.
//!
//! A [`JoinableFile`] wraps one path. One [`JoinWriter`] appends to it and
//! advances a committed watermark; any number of [`JoinReader`]s join at any
//! time and see a growing prefix of the writer's bytes.
//!
//! # Visibility
//!
//! ```text
//!   writer:  write_all(fd_w) ──> lock { committed += n; notify_all }
//!   reader:  lock { wait until committed > pos; snapshot } ──> read(fd_r, pos..snapshot)
//! ```
//!
//! The writer's bytes reach the file before the watermark moves, so a
//! reader copying up to its snapshot never sees a torn write. Only the
//! watermark and membership live under the lock; byte copies do not.
//!
//! # Lifecycle
//!
//! Opening for output creates the file, takes the advisory OS lock and
//! truncates. Closing the writer is terminal: content is immutable and any
//! later joiner reads it in full, then gets end-of-stream.

mod reader;
mod state;
mod writer;

pub use reader::JoinReader;
pub use writer::JoinWriter;

use crate::config::JoinableConfig;
use crate::error::{PartylineError, Result};
use state::{Shared, WriterSlot};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Point-in-time view of a joinable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Path of the file.
    pub path: PathBuf,
    /// Committed watermark.
    pub committed: u64,
    /// Whether the writer has closed.
    pub closed: bool,
    /// Whether a writer handle is currently handed out.
    pub writer_active: bool,
    /// Number of joined readers.
    pub readers: usize,
}

/// Shared handle on one joinable file. Clones refer to the same file.
#[derive(Clone)]
pub struct JoinableFile {
    shared: Arc<Shared>,
}

impl JoinableFile {
    /// Open `path`.
    ///
    /// With `for_output`, the file is created or truncated under an
    /// exclusive lock and its writer handle is parked for [`writer`](Self::writer).
    /// Without it, the file must already exist and is opened closed, with
    /// its current length committed.
    ///
    /// Exclusion between direct output opens comes from the OS lock alone.
    /// With [`JoinableConfig::os_lock`] off, open through a
    /// [`Partyline`](crate::Partyline) registry instead.
    pub fn open(path: impl AsRef<Path>, for_output: bool, config: JoinableConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let (slot, committed) = if for_output {
            (WriterSlot::Parked(open_output(&path, &config)?), 0)
        } else {
            let meta = std::fs::metadata(&path).map_err(|e| PartylineError::io(&path, e))?;
            (WriterSlot::Closed, meta.len())
        };

        tracing::debug!(path = %path.display(), for_output, committed, "Opened joinable file");

        Ok(Self {
            shared: Arc::new(Shared::new(path, config, slot, committed)),
        })
    }

    /// Open `path` for output and take its writer in one step.
    pub fn create(path: impl AsRef<Path>, config: JoinableConfig) -> Result<JoinWriter> {
        Self::open(path, true, config)?.writer()
    }

    fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Take the writer handle.
    ///
    /// Fails with `LockConflict` while another handle is open and with
    /// `WriterClosed` once the file has been closed.
    pub fn writer(&self) -> Result<JoinWriter> {
        let file = self.shared.take_writer()?;
        Ok(JoinWriter::new(file, Arc::clone(&self.shared)))
    }

    /// Join as a reader starting at offset 0.
    pub fn join(&self) -> Result<JoinReader> {
        JoinReader::open(Arc::clone(&self.shared))
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// Configuration shared by every handle.
    pub fn config(&self) -> &JoinableConfig {
        self.shared.config()
    }

    /// Committed watermark.
    pub fn committed(&self) -> u64 {
        self.shared.committed()
    }

    /// Whether the writer has closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Whether the write lock is held, parked or handed out.
    pub fn has_writer(&self) -> bool {
        self.shared.has_writer()
    }

    /// Number of joined readers.
    pub fn reader_count(&self) -> usize {
        self.shared.reader_count()
    }

    /// Consistent snapshot of the file's state.
    pub fn status(&self) -> FileStatus {
        let (committed, closed, writer_active, readers) = self.shared.snapshot();
        FileStatus {
            path: self.shared.path().to_path_buf(),
            committed,
            closed,
            writer_active,
            readers,
        }
    }
}

impl std::fmt::Debug for JoinableFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinableFile")
            .field("status", &self.status())
            .finish()
    }
}

/// Create the output file, lock it, then truncate.
///
/// Truncating only after the lock is won keeps a losing opener from
/// clobbering the winner's bytes.
fn open_output(path: &Path, config: &JoinableConfig) -> Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| PartylineError::io(path, e))?;

    if config.os_lock {
        // Explicit fs2 call: std::fs::File has an inherent try_lock_exclusive since 1.89.
        fs2::FileExt::try_lock_exclusive(&file).map_err(|e| lock_error(path, e))?;
    }

    file.set_len(0).map_err(|e| PartylineError::io(path, e))?;
    Ok(file)
}

fn lock_error(path: &Path, err: std::io::Error) -> PartylineError {
    let contended = fs2::lock_contended_error();
    let is_contended = err.kind() == std::io::ErrorKind::WouldBlock
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error());

    if is_contended {
        tracing::debug!(path = %path.display(), "Output lock contended");
        PartylineError::LockConflict {
            path: path.to_path_buf(),
        }
    } else {
        PartylineError::io(path, err)
    }
}
