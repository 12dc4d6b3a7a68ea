//! Timed tasks: units of work with deliberate delays between steps.
//!
//! A task sleeps, performs I/O, sleeps again and finishes. The harness
//! stamps its completion time; the delays are what expose timing races
//! between writers and joining readers.

mod cancel;
mod delay;

pub use cancel::CancelToken;
pub use delay::Delay;

use partyline_core::Result;
use std::time::Instant;

/// Monotonic clock shared by every task of one run.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Start a clock at zero now.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the clock started.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// What a task can see of the run it belongs to.
pub struct TaskContext {
    name: String,
    clock: Clock,
    cancel: CancelToken,
}

impl TaskContext {
    /// Create a context for task `name`.
    pub fn new(name: impl Into<String>, clock: Clock, cancel: CancelToken) -> Self {
        Self {
            name: name.into(),
            clock,
            cancel,
        }
    }

    /// Name of the task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Milliseconds since the run started.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Sleep unless cancelled.
    pub fn sleep(&self, delay: Delay) -> Result<()> {
        self.cancel.sleep(delay, &self.name)
    }

    /// Sleep for `delay` regardless of cancellation.
    ///
    /// For steps that must run to completion once started, such as the
    /// gaps between a writer's commits.
    pub fn pause(&self, delay: Delay) {
        if let Some(duration) = delay.as_duration() {
            std::thread::sleep(duration);
        }
    }

    /// Check if the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The run's cancellation token.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// A unit of work launched on its own thread by the timing harness.
pub trait TimedTask: Send + 'static {
    /// Unique name within one run; timings are keyed by it.
    fn name(&self) -> &str;

    /// Run to completion. Errors abort the whole run.
    fn run(&mut self, ctx: &TaskContext) -> Result<()>;
}

/// A task built from a closure.
pub struct FnTask {
    name: String,
    body: Box<dyn FnMut(&TaskContext) -> Result<()> + Send>,
}

impl FnTask {
    /// Wrap `body` as a task called `name`.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&TaskContext) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }
}

impl TimedTask for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &TaskContext) -> Result<()> {
        (self.body)(ctx)
    }
}
