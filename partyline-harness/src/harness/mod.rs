//! Timing harness: runs timed tasks on their own threads and collects
//! their completion times.
//!
//! Tasks are launched in submission order with a pause between launches,
//! so join ordering between readers and writers is reproducible. The run
//! ends when every task has signalled, when one fails, or when the bound
//! in [`HarnessConfig`] expires:
//!
//! - The first error or panic is returned and the shared cancel token is
//!   set. Sleeping tasks and readers waiting for bytes wake and stop;
//!   writers that already opened their file finish and close it. Every
//!   thread is joined before the error is returned, within the run bound.
//! - On `RunTimeout` the token is set and stuck threads are left detached.

mod completion;
mod config;
mod timings;

pub use completion::CompletionGroup;
pub use config::{DEFAULT_RUN_TIMEOUT_MS, DEFAULT_START_DELAY_MS, HarnessConfig};
pub use timings::Timings;

use crate::task::{CancelToken, Clock, Delay, TaskContext, TimedTask};
use partyline_core::{PartylineError, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Launches timed tasks and collects their completion timestamps.
#[derive(Debug, Clone, Default)]
pub struct TimingHarness {
    config: HarnessConfig,
}

impl TimingHarness {
    /// Create a harness with `config`.
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// The harness configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `tasks` with the configured start delay.
    pub fn run(&self, tasks: Vec<Box<dyn TimedTask>>) -> Result<Timings> {
        self.run_and_collect(self.config.start_delay_ms, tasks)
    }

    /// Run `tasks`, pausing `start_delay_ms` between launches, and return
    /// each task's completion time keyed by name.
    ///
    /// Names should be unique; a later task overwrites an earlier one of the
    /// same name.
    pub fn run_and_collect(
        &self,
        start_delay_ms: u64,
        tasks: Vec<Box<dyn TimedTask>>,
    ) -> Result<Timings> {
        let label = self.config.label.as_str();
        let clock = Clock::start();
        let cancel = CancelToken::new();
        let group = Arc::new(CompletionGroup::new(tasks.len()));
        let names: Vec<String> = tasks.iter().map(|t| t.name().to_string()).collect();
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(tasks.len());

        tracing::info!(run = label, tasks = tasks.len(), start_delay_ms, "Starting run");

        for (index, task) in tasks.into_iter().enumerate() {
            if index > 0 && cancel.sleep(Delay::Millis(start_delay_ms), label).is_err() {
                // Something already failed; account for the tasks never launched.
                for (skipped, name) in names.iter().enumerate().skip(index) {
                    group.complete(
                        skipped,
                        clock.now_ms(),
                        Err(PartylineError::Interrupted { task: name.clone() }),
                    );
                }
                break;
            }

            match spawn_task(label, index, task, clock, &cancel, &group) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::error!(run = label, error = %err, "Task launch failed");
                    group.complete(index, clock.now_ms(), Err(err));
                    cancel.cancel();
                }
            }
        }

        match group.wait(self.config.run_timeout()) {
            Ok(stamps) => {
                join_all(handles);
                let timings = Timings::from_pairs(names.into_iter().zip(stamps));
                tracing::info!(run = label, elapsed_ms = clock.now_ms(), "Run complete");
                Ok(timings)
            }
            Err(err @ PartylineError::RunTimeout { .. }) => {
                cancel.cancel();
                tracing::error!(run = label, error = %err, "Run timed out; detaching tasks");
                Err(err)
            }
            Err(err) => {
                cancel.cancel();
                tracing::error!(run = label, error = %err, "Run failed");
                if group.settle(self.config.run_timeout()) {
                    join_all(handles);
                } else {
                    tracing::warn!(
                        run = label,
                        pending = group.pending(),
                        "Tasks still running after cancel; detaching"
                    );
                }
                Err(err)
            }
        }
    }
}

fn spawn_task(
    label: &str,
    index: usize,
    mut task: Box<dyn TimedTask>,
    clock: Clock,
    cancel: &CancelToken,
    group: &Arc<CompletionGroup>,
) -> Result<JoinHandle<()>> {
    let name = task.name().to_string();
    let ctx = TaskContext::new(name.clone(), clock, cancel.clone());
    let group = Arc::clone(group);

    tracing::debug!(run = label, task = %name, at_ms = clock.now_ms(), "Launching task");

    thread::Builder::new()
        .name(format!("{label}::{name}"))
        .spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| task.run(&ctx))) {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(PartylineError::TaskFailed {
                    task: ctx.name().to_string(),
                    source: Box::new(err),
                }),
                Err(payload) => Err(PartylineError::TaskPanicked {
                    task: ctx.name().to_string(),
                    message: panic_message(payload.as_ref()),
                }),
            };
            let stamp = ctx.now_ms();

            match &outcome {
                Ok(()) => tracing::debug!(task = ctx.name(), at_ms = stamp, "Task finished"),
                Err(err) if err.root().is_cancellation() => {
                    tracing::debug!(task = ctx.name(), "Task interrupted")
                }
                Err(err) => tracing::error!(task = ctx.name(), error = %err, "Task failed"),
            }

            let failed = outcome.is_err();
            // Record before cancelling so the first real failure wins over
            // the interruptions it causes.
            group.complete(index, stamp, outcome);
            if failed {
                ctx.cancel_token().cancel();
            }
        })
        .map_err(|e| PartylineError::TaskSpawn {
            task: name,
            cause: e.to_string(),
        })
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        // Task bodies run under catch_unwind, so this only fails on a panic
        // in the bookkeeping itself.
        if handle.join().is_err() {
            tracing::warn!("Task thread panicked outside its task body");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
