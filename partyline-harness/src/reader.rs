//! Reader task: joins a file mid-write and consumes bytes as they appear.

use crate::task::{Delay, TaskContext, TimedTask};
use parking_lot::Mutex;
use partyline_core::{DEFAULT_CHUNK_SIZE, JoinableFile, PartylineError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a reader task reads from.
#[derive(Debug, Clone)]
pub enum ReadTarget {
    /// Join a live joinable file.
    Joinable(JoinableFile),
    /// Open the path independently with plain file I/O, for comparison.
    Raw(PathBuf),
}

/// One observation made after a chunk was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSample {
    /// Run clock reading.
    pub at_ms: u64,
    /// Committed watermark at that moment (file length for raw reads).
    pub committed: u64,
    /// Bytes this reader had consumed.
    pub read_total: u64,
}

/// Everything a reader task observed.
#[derive(Debug, Clone, Default)]
pub struct ReadLog {
    /// Concatenation of every chunk read.
    pub bytes: Vec<u8>,
    /// Number of non-empty chunks.
    pub chunks: usize,
    /// One sample per chunk.
    pub samples: Vec<ReadSample>,
    /// When the reader joined or opened its target.
    pub joined_at_ms: Option<u64>,
    /// Whether the reader reached end-of-stream.
    pub end_of_stream: bool,
}

/// Shared view of a reader task's log, readable after the run.
#[derive(Debug, Clone, Default)]
pub struct ReaderOutput {
    log: Arc<Mutex<ReadLog>>,
}

impl ReaderOutput {
    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> ReadLog {
        self.log.lock().clone()
    }

    /// Bytes read so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.log.lock().bytes.clone()
    }

    /// Number of bytes read so far.
    pub fn len(&self) -> usize {
        self.log.lock().bytes.len()
    }

    /// Check if nothing has been read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether end-of-stream was observed.
    pub fn reached_end(&self) -> bool {
        self.log.lock().end_of_stream
    }

    fn joined(&self, at_ms: u64) {
        self.log.lock().joined_at_ms = Some(at_ms);
    }

    fn record(&self, chunk: &[u8], at_ms: u64, committed: u64) {
        let mut log = self.log.lock();
        log.bytes.extend_from_slice(chunk);
        log.chunks += 1;
        let read_total = log.bytes.len() as u64;
        log.samples.push(ReadSample {
            at_ms,
            committed,
            read_total,
        });
    }

    fn finished(&self) {
        self.log.lock().end_of_stream = true;
    }
}

/// Sleeps, joins its target, reads chunk by chunk until end-of-stream,
/// sleeps again and closes.
pub struct ReaderTask {
    name: String,
    initial_delay: Delay,
    read_delay: Delay,
    close_delay: Delay,
    target: ReadTarget,
    chunk_size: usize,
    output: ReaderOutput,
}

impl ReaderTask {
    /// Create a reader task.
    pub fn new(
        name: impl Into<String>,
        initial_delay: Delay,
        read_delay: Delay,
        close_delay: Delay,
        target: ReadTarget,
    ) -> Self {
        let chunk_size = match &target {
            ReadTarget::Joinable(file) => file.config().chunk_size,
            ReadTarget::Raw(_) => DEFAULT_CHUNK_SIZE,
        };
        Self {
            name: name.into(),
            initial_delay,
            read_delay,
            close_delay,
            target,
            chunk_size,
            output: ReaderOutput::default(),
        }
    }

    /// Reader that joins `file` after `initial_delay` with no other delays.
    pub fn joining(name: impl Into<String>, initial_delay: Delay, file: &JoinableFile) -> Self {
        Self::new(
            name,
            initial_delay,
            Delay::None,
            Delay::None,
            ReadTarget::Joinable(file.clone()),
        )
    }

    /// Set the read chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Handle on what this task reads, usable after it moves into the harness.
    pub fn output(&self) -> ReaderOutput {
        self.output.clone()
    }

    fn read_joined(&self, file: &JoinableFile, ctx: &TaskContext) -> Result<()> {
        let mut reader = file.join()?;
        self.output.joined(ctx.now_ms());
        tracing::debug!(task = %self.name, path = %file.path().display(), "Joined file");

        let interrupted = || PartylineError::Interrupted {
            task: self.name.clone(),
        };
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            // Waiting for the writer must not outlive a cancelled run.
            let Some(n) = reader.read_or_abort(&mut buf, || ctx.is_cancelled())? else {
                return Err(interrupted());
            };
            if n == 0 {
                break;
            }
            self.output.record(&buf[..n], ctx.now_ms(), reader.committed());
            if ctx.is_cancelled() {
                return Err(interrupted());
            }
            ctx.sleep(self.read_delay)?;
        }
        self.output.finished();

        ctx.sleep(self.close_delay)?;
        tracing::debug!(task = %self.name, read = reader.position(), "Reader done");
        reader.close();
        Ok(())
    }

    fn read_raw(&self, path: &Path, ctx: &TaskContext) -> Result<()> {
        let mut file = File::open(path).map_err(|e| PartylineError::io(path, e))?;
        self.output.joined(ctx.now_ms());

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf).map_err(|e| PartylineError::io(path, e))?;
            if n == 0 {
                break;
            }
            let length = file.metadata().map(|m| m.len()).unwrap_or_default();
            self.output.record(&buf[..n], ctx.now_ms(), length);
            ctx.sleep(self.read_delay)?;
        }
        self.output.finished();

        ctx.sleep(self.close_delay)?;
        tracing::debug!(task = %self.name, path = %path.display(), "Raw reader done");
        Ok(())
    }
}

impl TimedTask for ReaderTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        ctx.sleep(self.initial_delay)?;
        match &self.target {
            ReadTarget::Joinable(file) => self.read_joined(file, ctx),
            ReadTarget::Raw(path) => self.read_raw(path, ctx),
        }
    }
}
