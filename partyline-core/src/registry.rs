//! Path-keyed registry of live joinable files.
//!
//! [`Partyline`] is the in-process entry point behind "open this path for
//! writing" and "join whatever is at this path". It keeps one
//! [`JoinableFile`] per path so that a second writer is refused before it
//! ever touches the file, and so readers joining by path attach to the live
//! writer instead of reading a half-written file cold.

use crate::config::JoinableConfig;
use crate::error::{PartylineError, Result};
use crate::joinable::{JoinReader, JoinWriter, JoinableFile};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Registry of joinable files keyed by normalised path.
pub struct Partyline {
    config: JoinableConfig,
    files: Mutex<HashMap<PathBuf, JoinableFile>>,
}

impl Default for Partyline {
    fn default() -> Self {
        Self::new(JoinableConfig::default())
    }
}

impl Partyline {
    /// Create a registry whose files all use `config`.
    pub fn new(config: JoinableConfig) -> Self {
        Self {
            config,
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Configuration applied to every file opened here.
    pub fn config(&self) -> &JoinableConfig {
        &self.config
    }

    /// Open `path` for exclusive writing.
    ///
    /// Fails with `LockConflict` while another writer is open on the same
    /// path, whether it was opened here or by another process holding the
    /// OS lock. A closed file whose readers have not all left also refuses
    /// a new writer, so its content stays intact until the last reader goes.
    pub fn open_for_write(&self, path: impl AsRef<Path>) -> Result<JoinWriter> {
        let key = registry_key(path.as_ref());
        let mut files = self.files.lock();
        prune(&mut files);

        // After pruning, a surviving entry either has a writer or is closed
        // with readers still draining its immutable content.
        if let Some(existing) = files.get(&key) {
            let status = existing.status();
            tracing::debug!(
                path = %key.display(),
                closed = status.closed,
                readers = status.readers,
                "Refusing writer on busy path"
            );
            return Err(PartylineError::LockConflict { path: key });
        }

        let file = JoinableFile::open(&key, true, self.config.clone())?;
        let writer = file.writer()?;
        files.insert(key, file);
        Ok(writer)
    }

    /// Join the file at `path`.
    ///
    /// Attaches to the live file if one is registered; otherwise opens the
    /// on-disk file in its closed state. `NotFound` if neither exists.
    pub fn join(&self, path: impl AsRef<Path>) -> Result<JoinReader> {
        let key = registry_key(path.as_ref());
        let mut files = self.files.lock();
        prune(&mut files);

        if let Some(existing) = files.get(&key) {
            return existing.join();
        }

        let file = JoinableFile::open(&key, false, self.config.clone())?;
        let reader = file.join()?;
        files.insert(key, file);
        Ok(reader)
    }

    /// The live file registered for `path`, if any.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<JoinableFile> {
        let key = registry_key(path.as_ref());
        let mut files = self.files.lock();
        prune(&mut files);
        files.get(&key).cloned()
    }

    /// Paths that still have a writer or joined readers, sorted.
    pub fn active_paths(&self) -> Vec<PathBuf> {
        let mut files = self.files.lock();
        prune(&mut files);
        let mut paths: Vec<PathBuf> = files.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of live files.
    pub fn len(&self) -> usize {
        let mut files = self.files.lock();
        prune(&mut files);
        files.len()
    }

    /// Check if no file is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop files that are closed and have no readers left.
fn prune(files: &mut HashMap<PathBuf, JoinableFile>) {
    files.retain(|path, file| {
        let status = file.status();
        let live = !status.closed || status.readers > 0;
        if !live {
            tracing::trace!(path = %path.display(), "Pruned idle joinable file");
        }
        live
    });
}

/// Normalise `path` so aliases of one file share a registry entry.
///
/// The file itself may not exist yet, so only the parent is canonicalised.
fn registry_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            std::fs::canonicalize(parent)
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
