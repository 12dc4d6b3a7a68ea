//! Membership, lock and watermark state for one joinable file.

use crate::config::JoinableConfig;
use crate::error::{PartylineError, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Who holds the write side of the file.
pub(super) enum WriterSlot {
    /// Locked and truncated, waiting for someone to take the handle.
    Parked(File),
    /// A `JoinWriter` owns the file.
    Open,
    /// Terminal: content is immutable.
    Closed,
}

/// Everything mutated under the single critical section.
pub(super) struct FileState {
    writer: WriterSlot,
    committed: u64,
    readers: BTreeSet<u64>,
    next_reader_id: u64,
}

/// What a reader found after waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Watermark {
    /// Bytes up to this offset are committed and readable.
    Available(u64),
    /// The writer closed and the reader has consumed everything.
    EndOfStream,
}

/// State shared between a file, its writer and its readers.
pub(super) struct Shared {
    path: PathBuf,
    config: JoinableConfig,
    state: Mutex<FileState>,
    commits: Condvar,
}

impl Shared {
    pub(super) fn new(
        path: PathBuf,
        config: JoinableConfig,
        writer: WriterSlot,
        committed: u64,
    ) -> Self {
        Self {
            path,
            config,
            state: Mutex::new(FileState {
                writer,
                committed,
                readers: BTreeSet::new(),
                next_reader_id: 0,
            }),
            commits: Condvar::new(),
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    pub(super) fn config(&self) -> &JoinableConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock()
    }

    /// Move the parked writer file out, marking the slot open.
    pub(super) fn take_writer(&self) -> Result<File> {
        let mut state = self.lock();
        match std::mem::replace(&mut state.writer, WriterSlot::Open) {
            WriterSlot::Parked(file) => Ok(file),
            WriterSlot::Open => Err(PartylineError::LockConflict {
                path: self.path.clone(),
            }),
            WriterSlot::Closed => {
                state.writer = WriterSlot::Closed;
                Err(PartylineError::WriterClosed {
                    path: self.path.clone(),
                })
            }
        }
    }

    /// Advance the watermark by `len` bytes and wake every waiting reader.
    ///
    /// The bytes must already be in the file.
    pub(super) fn commit(&self, len: u64) -> u64 {
        let mut state = self.lock();
        state.committed += len;
        let committed = state.committed;
        drop(state);
        self.commits.notify_all();
        committed
    }

    /// Enter the terminal closed state. Returns the final length.
    pub(super) fn close_writer(&self) -> u64 {
        let mut state = self.lock();
        state.writer = WriterSlot::Closed;
        let committed = state.committed;
        drop(state);
        self.commits.notify_all();
        committed
    }

    pub(super) fn register_reader(&self) -> u64 {
        let mut state = self.lock();
        let id = state.next_reader_id;
        state.next_reader_id += 1;
        state.readers.insert(id);
        id
    }

    pub(super) fn deregister_reader(&self, id: u64) {
        self.lock().readers.remove(&id);
    }

    /// Block until bytes beyond `position` are committed or the stream ends.
    pub(super) fn wait_beyond(
        &self,
        position: u64,
        timeout: Option<Duration>,
    ) -> Result<Watermark> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if state.committed > position {
                return Ok(Watermark::Available(state.committed));
            }
            if matches!(state.writer, WriterSlot::Closed) {
                return Ok(Watermark::EndOfStream);
            }
            match deadline {
                Some(deadline) => {
                    if self.commits.wait_until(&mut state, deadline).timed_out()
                        && state.committed <= position
                        && !matches!(state.writer, WriterSlot::Closed)
                    {
                        return Err(PartylineError::WaitExceeded {
                            path: self.path.clone(),
                            timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
                        });
                    }
                }
                None => self.commits.wait(&mut state),
            }
        }
    }

    /// Non-blocking variant of [`wait_beyond`](Self::wait_beyond).
    pub(super) fn poll_beyond(&self, position: u64) -> Option<Watermark> {
        let state = self.lock();
        if state.committed > position {
            Some(Watermark::Available(state.committed))
        } else if matches!(state.writer, WriterSlot::Closed) {
            Some(Watermark::EndOfStream)
        } else {
            None
        }
    }

    pub(super) fn committed(&self) -> u64 {
        self.lock().committed
    }

    pub(super) fn is_closed(&self) -> bool {
        matches!(self.lock().writer, WriterSlot::Closed)
    }

    pub(super) fn has_writer(&self) -> bool {
        !matches!(self.lock().writer, WriterSlot::Closed)
    }

    pub(super) fn reader_count(&self) -> usize {
        self.lock().readers.len()
    }

    /// Consistent view of every field, taken under one lock.
    pub(super) fn snapshot(&self) -> (u64, bool, bool, usize) {
        let state = self.lock();
        let closed = matches!(state.writer, WriterSlot::Closed);
        let writer_open = matches!(state.writer, WriterSlot::Open);
        (state.committed, closed, writer_open, state.readers.len())
    }
}
