//! Counting completion signal for one harness run.

use parking_lot::{Condvar, Mutex};
use partyline_core::{PartylineError, Result};
use std::time::{Duration, Instant};

struct GroupState {
    remaining: usize,
    stamps: Vec<Option<u64>>,
    failure: Option<PartylineError>,
}

/// Waits for N tasks, recording each completion stamp exactly once.
///
/// The first failure is kept and ends [`wait`](Self::wait) early.
pub struct CompletionGroup {
    state: Mutex<GroupState>,
    done: Condvar,
}

impl CompletionGroup {
    /// Expect `count` completions.
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(GroupState {
                remaining: count,
                stamps: vec![None; count],
                failure: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Record that task `index` finished at `stamp_ms` with `outcome`.
    ///
    /// Later signals for the same index are ignored.
    pub fn complete(&self, index: usize, stamp_ms: u64, outcome: Result<()>) {
        let mut state = self.state.lock();
        let Some(slot) = state.stamps.get_mut(index) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        *slot = Some(stamp_ms);
        state.remaining -= 1;

        if let Err(err) = outcome {
            if state.failure.is_none() {
                state.failure = Some(err);
            }
        }
        drop(state);
        self.done.notify_all();
    }

    /// Tasks that have not signalled yet.
    pub fn pending(&self) -> usize {
        self.state.lock().remaining
    }

    /// Block until every task signalled, one failed, or `timeout` elapsed.
    ///
    /// Returns the stamps in submission order.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<u64>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if let Some(err) = state.failure.take() {
                return Err(err);
            }
            if state.remaining == 0 {
                return Ok(state.stamps.iter().map(|s| s.unwrap_or_default()).collect());
            }
            match deadline {
                Some(deadline) => {
                    if self.done.wait_until(&mut state, deadline).timed_out()
                        && state.remaining > 0
                        && state.failure.is_none()
                    {
                        return Err(PartylineError::RunTimeout {
                            timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
                            pending: state.remaining,
                        });
                    }
                }
                None => self.done.wait(&mut state),
            }
        }
    }

    /// Block until every task signalled, ignoring failures. `false` if
    /// `timeout` elapsed first; `None` waits as long as it takes.
    pub fn settle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.remaining > 0 {
            match deadline {
                Some(deadline) => {
                    if self.done.wait_until(&mut state, deadline).timed_out() {
                        return state.remaining == 0;
                    }
                }
                None => self.done.wait(&mut state),
            }
        }
        true
    }
}
