//! Writer task: opens a file for exclusive write and appends over time.

use crate::task::{Delay, TaskContext, TimedTask};
use parking_lot::Mutex;
use partyline_core::{JoinWriter, JoinableFile, Partyline, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a writer task gets its write handle.
#[derive(Clone)]
pub enum WriteTarget {
    /// Take the parked writer of a file opened for output.
    Joinable(JoinableFile),
    /// Open the path through a registry.
    Registry {
        /// Registry that arbitrates writers.
        partyline: Arc<Partyline>,
        /// Path to open.
        path: PathBuf,
    },
}

impl WriteTarget {
    fn open(&self) -> Result<JoinWriter> {
        match self {
            Self::Joinable(file) => file.writer(),
            Self::Registry { partyline, path } => partyline.open_for_write(path),
        }
    }
}

/// One committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    /// Watermark after the write.
    pub committed: u64,
    /// Run clock reading right after the commit.
    pub at_ms: u64,
}

/// Everything a writer task did.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    /// Commits in order.
    pub commits: Vec<Commit>,
    /// Final length, once closed.
    pub closed_at: Option<u64>,
}

/// Shared view of a writer task's log, readable after the run.
#[derive(Debug, Clone, Default)]
pub struct WriterOutput {
    log: Arc<Mutex<WriteLog>>,
}

impl WriterOutput {
    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> WriteLog {
        self.log.lock().clone()
    }

    /// Clock reading of the last commit.
    pub fn last_commit_ms(&self) -> Option<u64> {
        self.log.lock().commits.last().map(|c| c.at_ms)
    }

    /// Final length if the writer closed.
    pub fn closed_at(&self) -> Option<u64> {
        self.log.lock().closed_at
    }

    fn record(&self, committed: u64, at_ms: u64) {
        self.log.lock().commits.push(Commit { committed, at_ms });
    }

    fn closed(&self, committed: u64) {
        self.log.lock().closed_at = Some(committed);
    }
}

/// Opens its target for write, writes each chunk with a delay in between,
/// then closes.
pub struct WriterTask {
    name: String,
    target: WriteTarget,
    initial_delay: Delay,
    write_delay: Delay,
    close_delay: Delay,
    chunks: Vec<Vec<u8>>,
    output: WriterOutput,
}

impl WriterTask {
    /// Create a writer task that writes `chunks` in order.
    pub fn new(
        name: impl Into<String>,
        target: WriteTarget,
        write_delay: Delay,
        chunks: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            initial_delay: Delay::None,
            write_delay,
            close_delay: Delay::None,
            chunks,
            output: WriterOutput::default(),
        }
    }

    /// Write `payload` as `pieces` roughly equal chunks.
    pub fn with_payload(
        name: impl Into<String>,
        target: WriteTarget,
        write_delay: Delay,
        payload: &[u8],
        pieces: usize,
    ) -> Self {
        let size = payload.len().div_ceil(pieces.max(1)).max(1);
        let chunks = payload.chunks(size).map(<[u8]>::to_vec).collect();
        Self::new(name, target, write_delay, chunks)
    }

    /// Sleep before opening the target.
    pub fn with_initial_delay(mut self, delay: Delay) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sleep between the last write and close.
    pub fn with_close_delay(mut self, delay: Delay) -> Self {
        self.close_delay = delay;
        self
    }

    /// Total bytes this task will write.
    pub fn payload_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Handle on what this task commits, usable after it moves into the harness.
    pub fn output(&self) -> WriterOutput {
        self.output.clone()
    }
}

impl TimedTask for WriterTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        ctx.sleep(self.initial_delay)?;

        // A conflict is this task's failure; the run decides what that means.
        let mut writer = self.target.open()?;
        tracing::debug!(task = %self.name, path = %writer.path().display(), "Writer opened");

        // Once open, the writer runs to its own close even if the run is
        // cancelled, so readers never see end-of-stream on a cut payload.
        for (i, chunk) in self.chunks.iter().enumerate() {
            if i > 0 {
                ctx.pause(self.write_delay);
            }
            let committed = writer.write(chunk)?;
            self.output.record(committed, ctx.now_ms());
        }

        ctx.pause(self.close_delay);
        let committed = writer.close()?;
        self.output.closed(committed);
        tracing::debug!(task = %self.name, committed, "Writer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{CancelToken, Clock};
    use partyline_core::{JoinableConfig, PartylineError};

    fn context() -> TaskContext {
        TaskContext::new("writer", Clock::start(), CancelToken::new())
    }

    #[test]
    fn payload_is_split_evenly() {
        let dir = tempfile::tempdir().unwrap();
        let file = JoinableFile::open(dir.path().join("a"), true, JoinableConfig::default()).unwrap();
        let task = WriterTask::with_payload(
            "w",
            WriteTarget::Joinable(file),
            Delay::None,
            &[1u8; 10],
            3,
        );
        let sizes: Vec<usize> = task.chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(task.payload_len(), 10);
    }

    #[test]
    fn run_records_every_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.bin");
        let file = JoinableFile::open(&path, true, JoinableConfig::default()).unwrap();
        let mut task = WriterTask::new(
            "w",
            WriteTarget::Joinable(file.clone()),
            Delay::Millis(1),
            vec![b"ab".to_vec(), b"cde".to_vec()],
        );
        let output = task.output();

        task.run(&context()).unwrap();

        let log = output.snapshot();
        let committed: Vec<u64> = log.commits.iter().map(|c| c.committed).collect();
        assert_eq!(committed, vec![2, 5]);
        assert_eq!(log.closed_at, Some(5));
        assert!(file.is_closed());
        assert_eq!(std::fs::read(&path).unwrap(), b"abcde");
    }

    #[test]
    fn cancelled_writer_finishes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.bin");
        let file = JoinableFile::open(&path, true, JoinableConfig::default()).unwrap();
        let mut task = WriterTask::new(
            "w",
            WriteTarget::Joinable(file.clone()),
            Delay::Millis(20),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()],
        );
        let output = task.output();

        let cancel = CancelToken::new();
        let ctx = TaskContext::new("w", Clock::start(), cancel.clone());
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            cancel.cancel();
        });
        task.run(&ctx).unwrap();
        canceller.join().unwrap();
        assert!(ctx.is_cancelled());

        assert_eq!(output.snapshot().commits.len(), 3);
        assert_eq!(output.closed_at(), Some(11));
        assert_eq!(std::fs::read(&path).unwrap(), b"onetwothree");
    }

    #[test]
    fn cancel_before_open_skips_writer() {
        let dir = tempfile::tempdir().unwrap();
        let file =
            JoinableFile::open(dir.path().join("idle.bin"), true, JoinableConfig::default()).unwrap();
        let mut task = WriterTask::new(
            "w",
            WriteTarget::Joinable(file.clone()),
            Delay::None,
            vec![b"x".to_vec()],
        )
        .with_initial_delay(Delay::Millis(1_000));

        let cancel = CancelToken::new();
        let ctx = TaskContext::new("w", Clock::start(), cancel.clone());
        cancel.cancel();
        assert!(task.run(&ctx).unwrap_err().is_cancellation());
        assert!(file.has_writer());
        assert_eq!(file.committed(), 0);
    }

    #[test]
    fn registry_conflict_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.bin");
        let partyline = Arc::new(Partyline::default());
        let _holder = partyline.open_for_write(&path).unwrap();

        let mut task = WriterTask::new(
            "late",
            WriteTarget::Registry {
                partyline: Arc::clone(&partyline),
                path,
            },
            Delay::None,
            vec![b"x".to_vec()],
        );
        let err = task.run(&context()).unwrap_err();
        assert!(matches!(err, PartylineError::LockConflict { .. }));
        assert!(task.output().snapshot().commits.is_empty());
    }
}
