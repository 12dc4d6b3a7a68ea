//! Joinable file configuration.

use crate::error::{PartylineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default read granularity for tasks consuming a joinable file.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration shared by every handle on one joinable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinableConfig {
    /// Bound on a reader's wait for new committed bytes.
    ///
    /// `None` waits until the writer commits or closes.
    pub read_timeout_ms: Option<u64>,
    /// Whether to `sync_data` after each write, before committing it.
    pub sync_on_write: bool,
    /// Whether the writer also takes an advisory exclusive OS lock.
    ///
    /// With the lock disabled, exclusion only holds for writers opened
    /// through the same [`Partyline`](crate::Partyline) registry. Two direct
    /// [`JoinableFile::open`](crate::JoinableFile::open) calls for output on
    /// one path then both succeed, and the second truncates whatever the
    /// first has written.
    pub os_lock: bool,
    /// Read granularity used by consumers that read in chunks.
    pub chunk_size: usize,
}

impl Default for JoinableConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: None,
            sync_on_write: false,
            os_lock: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl JoinableConfig {
    /// Bound every reader wait by `timeout`.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Let readers wait indefinitely for the writer.
    pub fn without_read_timeout(mut self) -> Self {
        self.read_timeout_ms = None;
        self
    }

    /// Set sync on write.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Enable or disable the advisory OS lock.
    pub fn with_os_lock(mut self, os_lock: bool) -> Self {
        self.os_lock = os_lock;
        self
    }

    /// Set the read chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// The reader wait bound as a `Duration`.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values that would make readers spin or never progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PartylineError::ConfigValue {
                field: "chunk_size".to_string(),
                cause: "must be greater than zero".to_string(),
            });
        }
        if self.read_timeout_ms == Some(0) {
            return Err(PartylineError::ConfigValue {
                field: "read_timeout_ms".to_string(),
                cause: "use None for an unbounded wait, not zero".to_string(),
            });
        }
        Ok(())
    }
}
