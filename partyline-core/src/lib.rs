//! Partyline Core Library
//!
//! Files shared between one writer and many concurrent readers while the
//! content is still growing.
//!
//! # Key Components
//!
//! - **JoinableFile**: the shared synchronization object for one path
//! - **JoinWriter / JoinReader**: the exclusive write handle and the joined
//!   read handles
//! - **Partyline**: a path-keyed registry that refuses a second writer and
//!   lets readers join by path
//!
//! # Example
//!
//! ```no_run
//! use partyline_core::{JoinableConfig, JoinableFile};
//!
//! # fn main() -> partyline_core::Result<()> {
//! let mut writer = JoinableFile::create("/tmp/artifact.bin", JoinableConfig::default())?;
//! let mut reader = writer.file().join()?;
//!
//! writer.write(b"first chunk")?;
//! writer.close()?;
//!
//! let mut out = Vec::new();
//! reader.read_all(&mut out)?;
//! assert_eq!(out, b"first chunk");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod joinable;
pub mod registry;

pub use config::{DEFAULT_CHUNK_SIZE, JoinableConfig};
pub use error::{PartylineError, Result};
pub use joinable::{FileStatus, JoinReader, JoinWriter, JoinableFile};
pub use registry::Partyline;
