//! Common test utilities for integration tests.

#![allow(dead_code)]

use partyline_core::{JoinableConfig, JoinableFile};
use partyline_harness::{HarnessConfig, TimedTask, TimingHarness};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deterministic, non-repeating-looking payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Path of `name` inside `dir`.
pub fn scratch(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// A file opened for output with the default config, writer parked.
pub fn output_file(path: &Path) -> JoinableFile {
    JoinableFile::open(path, true, JoinableConfig::default()).unwrap()
}

/// Harness with a run bound short enough to fail a hung test quickly.
pub fn test_harness() -> TimingHarness {
    TimingHarness::new(
        HarnessConfig::default()
            .with_label("test")
            .with_run_timeout(Some(Duration::from_secs(10))),
    )
}

/// Box a task for the harness.
pub fn boxed<T: TimedTask>(task: T) -> Box<dyn TimedTask> {
    Box::new(task)
}
