//! Error types for Partyline.
//!
//! Every error carries the path or task name it concerns, and a stable
//! code so harness output can be grepped across runs.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for Partyline operations.
#[derive(Error, Debug)]
pub enum PartylineError {
    // =========================================================================
    // Joinable File Errors (E001-E099)
    // =========================================================================
    /// A writer is already open on this path, or readers are still draining
    /// its closed content.
    #[error("E001: Lock conflict on {path}: the file is still in use")]
    LockConflict {
        /// The contended path.
        path: PathBuf,
    },

    /// Nothing to join: no writer registered and no file on disk.
    #[error("E002: No such joinable file: {path}")]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The writer for this file has already been closed.
    #[error("E003: Writer for {path} is closed")]
    WriterClosed {
        /// The path of the closed file.
        path: PathBuf,
    },

    /// A reader waited longer than its configured bound for new bytes.
    #[error("E004: Wait for new bytes on {path} exceeded {timeout_ms}ms")]
    WaitExceeded {
        /// The path being read.
        path: PathBuf,
        /// The configured wait bound.
        timeout_ms: u64,
    },

    // =========================================================================
    // Task Errors (E100-E199)
    // =========================================================================
    /// A task sleep or wait was cancelled.
    #[error("E101: Task '{task}' was interrupted")]
    Interrupted {
        /// The interrupted task.
        task: String,
    },

    /// A task returned an error.
    #[error("E102: Task '{task}' failed: {source}")]
    TaskFailed {
        /// The failing task.
        task: String,
        /// The error the task returned.
        #[source]
        source: Box<PartylineError>,
    },

    /// A task panicked.
    #[error("E103: Task '{task}' panicked: {message}")]
    TaskPanicked {
        /// The panicking task.
        task: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The harness gave up waiting for its tasks.
    #[error("E104: Run exceeded {timeout_ms}ms with {pending} task(s) still pending")]
    RunTimeout {
        /// The configured run bound.
        timeout_ms: u64,
        /// Tasks that never signalled completion.
        pending: usize,
    },

    /// A task thread could not be started.
    #[error("E105: Failed to spawn task '{task}': {cause}")]
    TaskSpawn {
        /// The task that was being launched.
        task: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Configuration Errors (E800-E899)
    // =========================================================================
    /// Invalid configuration value.
    #[error("E801: Invalid config value for '{field}': {cause}")]
    ConfigValue {
        /// The offending field.
        field: String,
        /// Why the value is invalid.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E900-E999)
    // =========================================================================
    /// Underlying file I/O failed.
    #[error("E901: I/O error on {path}: {cause}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The I/O failure.
        cause: String,
    },
}

impl PartylineError {
    /// Get the error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LockConflict { .. } => "E001",
            Self::NotFound { .. } => "E002",
            Self::WriterClosed { .. } => "E003",
            Self::WaitExceeded { .. } => "E004",
            Self::Interrupted { .. } => "E101",
            Self::TaskFailed { .. } => "E102",
            Self::TaskPanicked { .. } => "E103",
            Self::RunTimeout { .. } => "E104",
            Self::TaskSpawn { .. } => "E105",
            Self::ConfigValue { .. } => "E801",
            Self::Io { .. } => "E901",
        }
    }

    /// Check if the caller may reasonably retry.
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::LockConflict { .. } | Self::WaitExceeded { .. })
    }

    /// Check if this error is a cancellation rather than a fault.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// The innermost error, looking through `TaskFailed` wrappers.
    pub fn root(&self) -> &PartylineError {
        match self {
            Self::TaskFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Build an `Io` error for `path`, mapping `NotFound` to its own variant.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                cause: err.to_string(),
            }
        }
    }
}

/// Result type alias using `PartylineError`.
pub type Result<T> = std::result::Result<T, PartylineError>;
