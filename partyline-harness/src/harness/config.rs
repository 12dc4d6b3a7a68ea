//! Harness configuration.

use partyline_core::{PartylineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pause between launching consecutive tasks.
pub const DEFAULT_START_DELAY_MS: u64 = 2;

/// Bound on how long a run may wait for its tasks.
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 30_000;

/// Configuration for a [`TimingHarness`](super::TimingHarness).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Prefix for task thread names.
    pub label: String,
    /// Pause between launching consecutive tasks.
    pub start_delay_ms: u64,
    /// Bound on the completion wait. `None` waits forever.
    pub run_timeout_ms: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            label: "partyline".to_string(),
            start_delay_ms: DEFAULT_START_DELAY_MS,
            run_timeout_ms: Some(DEFAULT_RUN_TIMEOUT_MS),
        }
    }
}

impl HarnessConfig {
    /// Parse from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| PartylineError::ConfigValue {
            field: "harness".to_string(),
            cause: e.to_string(),
        })
    }

    /// Load from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PartylineError::io(path, e))?;
        Self::from_yaml_str(&content)
    }

    /// Set the thread name prefix.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the launch stagger.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set or clear the run bound.
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    /// The run bound as a `Duration`.
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}
