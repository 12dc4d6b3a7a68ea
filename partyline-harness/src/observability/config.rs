//! Configuration types for logging.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Read `PARTYLINE_LOG_FORMAT`, `PARTYLINE_LOG` (falling back to
    /// `RUST_LOG`) and `PARTYLINE_LOG_THREAD_NAMES`.
    pub fn from_env() -> Self {
        let log_format = env::var("PARTYLINE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_default();

        let log_filter = env::var("PARTYLINE_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
            include_thread_names: env::var("PARTYLINE_LOG_THREAD_NAMES")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the filter directives, e.g. `"info,partyline_core=trace"`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Print the emitting thread's name, which is `<run>::<task>` for tasks.
    pub fn with_thread_names(mut self, include: bool) -> Self {
        self.include_thread_names = include;
        self
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the log filter.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Check if thread names are printed.
    pub fn include_thread_names(&self) -> bool {
        self.include_thread_names
    }
}
