//! Artificial delays between task steps.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A delay at one step of a timed task.
///
/// Serialized as milliseconds, with `-1` meaning no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Delay {
    /// Skip the step entirely.
    #[default]
    None,
    /// Sleep this many milliseconds.
    Millis(u64),
}

impl Delay {
    /// Map a millisecond count, where any negative value means no delay.
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            Self::None
        } else {
            Self::Millis(ms as u64)
        }
    }

    /// The delay as a `Duration`, or `None` when no sleep should happen.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Millis(ms) => Some(Duration::from_millis(*ms)),
        }
    }

    /// Check if this delay skips sleeping.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<i64> for Delay {
    fn from(ms: i64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Delay> for i64 {
    fn from(delay: Delay) -> Self {
        match delay {
            Delay::None => -1,
            Delay::Millis(ms) => ms as i64,
        }
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self::Millis(duration.as_millis() as u64)
    }
}
