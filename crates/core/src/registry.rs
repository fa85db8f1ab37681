// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide registry of live job IDs.
//!
//! The log streamer polls this to decide whether a job's log file can still
//! grow. Critical sections are bounded to single insert/remove/lookup
//! operations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of currently-running job IDs behind a single coarse lock
#[derive(Clone, Default)]
pub struct RunningJobs {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl RunningJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a job as running
    pub fn insert(&self, id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());
    }

    /// Mark a job as finished
    pub fn remove(&self, id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }

    /// Check whether a job is still running
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
    }

    /// Number of currently-running jobs
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
