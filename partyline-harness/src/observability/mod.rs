//! Logging setup for harness runs.
//!
//! Every crate in the workspace logs through `tracing`; nothing is printed
//! unless a subscriber is installed. Call [`init_tracing`] once, early, to
//! see task launches, commits and failures.
//!
//! # Configuration
//!
//! - `PARTYLINE_LOG_FORMAT`: `json`, `pretty` or `compact` (default)
//! - `PARTYLINE_LOG` or `RUST_LOG`: filter directives, default `info`
//! - `PARTYLINE_LOG_THREAD_NAMES`: `true` to print task thread names
//!
//! # Example
//!
//! ```no_run
//! use partyline_harness::observability::{TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::from_env())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::init_tracing;
