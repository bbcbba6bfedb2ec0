//! Bounded rolling history of recent log lines.
//!
//! Most-recent-first, capped at the configured window size W. Insertion is
//! always at the head; once the window is full the oldest entry falls off
//! the tail silently. Dropped entries are gone for good, which is the
//! accepted lossy-history policy, not an error.

use std::collections::VecDeque;

/// Bounded most-recent-first log retention used for backtracking.
///
/// Owned exclusively by the forensic engine; nothing else mutates it.
#[derive(Debug)]
pub struct RollingHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RollingHistory {
    /// Create an empty history with window size `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Insert at the head, then trim the tail to the window size.
    pub fn push(&mut self, line: String) {
        self.entries.push_front(line);
        self.entries.truncate(self.capacity);
    }

    /// Full read, most-recent-first (index 0 is the newest line).
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Remove the first occurrence of `line`. Returns whether anything was
    /// removed; removing an absent line is a no-op.
    pub fn remove_first(&mut self, line: &str) -> bool {
        match self.entries.iter().position(|e| e == line) {
            Some(pos) => self.entries.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
