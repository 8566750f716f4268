//! Change detection over successive snapshots.
//!
//! The detector owns the set of keys observed by the last successful cycle.
//! Every diff *replaces* that set with the snapshot's keys: a key removed
//! remotely is forgotten, and notifies again if it ever comes back.
//!
//! An empty detector treats every record as new. There is no silent
//! baseline on first run.

use std::collections::HashSet;

use crate::types::{Delta, Snapshot};

#[derive(Debug, Default)]
pub struct ChangeDetector {
    known: HashSet<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `keys(snapshot) − known`, then adopt the snapshot's keys.
    ///
    /// Only call with a snapshot from a successful fetch; a failed cycle
    /// must leave the detector untouched.
    pub fn diff(&mut self, snapshot: Snapshot) -> Delta {
        let mut delta = Delta::default();
        let mut current = HashSet::with_capacity(snapshot.len());

        for (key, record) in snapshot {
            if !self.known.contains(&key) {
                delta.push(key.clone(), record);
            }
            current.insert(key);
        }

        tracing::debug!(
            previous = self.known.len(),
            current = current.len(),
            new = delta.len(),
            "snapshot diffed"
        );
        self.known = current;
        delta
    }

    /// Forget every known key; the next diff reports the whole snapshot.
    pub fn reset(&mut self) {
        tracing::info!("Clearing {} known keys", self.known.len());
        self.known.clear();
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.known.contains(key)
    }
}
