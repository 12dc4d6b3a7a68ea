//! # Partyline harness
//!
//! Timed reader and writer tasks over [`partyline_core`] joinable files,
//! and a harness that runs them on real threads to expose join and
//! lock races.
//!
//! ```no_run
//! use partyline_core::{JoinableConfig, JoinableFile};
//! use partyline_harness::{Delay, ReaderTask, TimedTask, TimingHarness, WriteTarget, WriterTask};
//!
//! let file = JoinableFile::open("/tmp/out.bin", true, JoinableConfig::default())?;
//! let payload = vec![7u8; 10_000];
//! let writer = WriterTask::with_payload(
//!     "writer",
//!     WriteTarget::Joinable(file.clone()),
//!     Delay::Millis(5),
//!     &payload,
//!     10,
//! );
//! let reader = ReaderTask::joining("reader", Delay::None, &file);
//! let output = reader.output();
//!
//! let tasks: Vec<Box<dyn TimedTask>> = vec![Box::new(writer), Box::new(reader)];
//! let timings = TimingHarness::default().run(tasks)?;
//! assert_eq!(output.bytes(), payload);
//! assert!(timings.contains("writer"));
//! # Ok::<(), partyline_core::PartylineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod harness;
pub mod observability;
pub mod reader;
pub mod task;
pub mod writer;

pub use harness::{CompletionGroup, HarnessConfig, TimingHarness, Timings};
pub use reader::{ReadLog, ReadSample, ReadTarget, ReaderOutput, ReaderTask};
pub use task::{CancelToken, Clock, Delay, FnTask, TaskContext, TimedTask};
pub use writer::{Commit, WriteLog, WriteTarget, WriterOutput, WriterTask};
