//! Cleanup coordinator.
//!
//! After a chain has been dispatched (successfully or not), the raw lines
//! that contributed to it are removed from the rolling history so the same
//! incident is never reprocessed. Eviction is best-effort and idempotent:
//! lines already gone are skipped, and nothing here can fail the pipeline.

use crate::history::RollingHistory;
use tracing::debug;

/// Remove each contributing line's first occurrence from the history.
/// Returns how many entries were actually removed.
pub fn evict_resolved(history: &mut RollingHistory, contributing: &[String]) -> usize {
    let mut removed = 0;
    for line in contributing {
        if history.remove_first(line) {
            removed += 1;
        }
    }
    debug!(
        removed,
        requested = contributing.len(),
        "evicted resolved lines from history"
    );
    removed
}
