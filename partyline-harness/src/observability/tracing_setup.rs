//! Tracing subscriber setup with format selection.

use anyhow::{Context, Result};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::{LogFormat, TracingConfig};

/// Install a global subscriber built from `config`.
///
/// Fails if a global subscriber is already set. An unparseable filter falls
/// back to `info`.
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format() {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_thread_names(config.include_thread_names())
                        .with_span_events(FmtSpan::CLOSE)
                        .flatten_event(true),
                )
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_names(config.include_thread_names()),
                )
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_thread_names(config.include_thread_names()),
                )
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }
    Ok(())
}
