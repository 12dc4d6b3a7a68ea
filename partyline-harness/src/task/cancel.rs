//! Cooperative cancellation shared by every task in one run.

use super::Delay;
use parking_lot::{Condvar, Mutex};
use partyline_core::{PartylineError, Result};
use std::sync::Arc;
use std::time::Instant;

struct CancelInner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// A cancellation flag whose sleeps wake as soon as it is set.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create an uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: Mutex::new(false),
                wake: Condvar::new(),
            }),
        }
    }

    /// Cancel and wake every sleeper. Idempotent.
    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.wake.notify_all();
    }

    /// Check if the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleep for `delay` on behalf of `task`.
    ///
    /// Returns `Interrupted` if the token is or becomes cancelled.
    pub fn sleep(&self, delay: Delay, task: &str) -> Result<()> {
        let interrupted = || PartylineError::Interrupted {
            task: task.to_string(),
        };

        let Some(duration) = delay.as_duration() else {
            return if self.is_cancelled() {
                Err(interrupted())
            } else {
                Ok(())
            };
        };

        let deadline = Instant::now() + duration;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self.inner.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }

        if *cancelled {
            Err(interrupted())
        } else {
            Ok(())
        }
    }
}
