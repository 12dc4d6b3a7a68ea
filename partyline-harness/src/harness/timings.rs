//! Completion timestamps of one harness run.

use serde::Serialize;
use std::collections::HashMap;

/// Task name to completion time, in milliseconds since the run started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timings {
    entries: HashMap<String, u64>,
}

impl Timings {
    pub(super) fn from_pairs(pairs: impl IntoIterator<Item = (String, u64)>) -> Self {
        let mut entries = HashMap::new();
        for (name, stamp) in pairs {
            if entries.insert(name.clone(), stamp).is_some() {
                tracing::warn!(task = %name, "Duplicate task name; earlier timing overwritten");
            }
        }
        Self { entries }
    }

    /// Completion time of `name`.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.get(name).copied()
    }

    /// Check if `name` completed in this run.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of recorded tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, stamp)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Task names sorted by completion time, ties broken by name.
    pub fn completion_order(&self) -> Vec<&str> {
        let mut pairs: Vec<(&str, u64)> = self.iter().collect();
        pairs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        pairs.into_iter().map(|(name, _)| name).collect()
    }

    /// Take the underlying map.
    pub fn into_inner(self) -> HashMap<String, u64> {
        self.entries
    }
}
