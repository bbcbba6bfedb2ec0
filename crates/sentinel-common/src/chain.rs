//! Forensic chain and resolution result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A causally-ordered sequence of signal-bearing log lines ending in a
/// fatal event.
///
/// Lines are chronological: the earliest causal signal first, the crash
/// line last. Immutable once built by the extraction engine; ownership
/// moves through dispatch and cleanup, it is never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicChain {
    /// Incident id, assigned at detection time.
    pub id: Uuid,
    /// Chronological signal lines, crash last.
    pub lines: Vec<String>,
    /// When the fatal event was detected.
    pub detected_at: DateTime<Utc>,
}

impl ForensicChain {
    /// Build a chain from chronological lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lines,
            detected_at: Utc::now(),
        }
    }

    /// The terminal crash line, if the chain is non-empty.
    pub fn crash_line(&self) -> Option<&str> {
        self.lines.last().map(|s| s.as_str())
    }

    /// The chain joined into a single newline-separated story.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Outcome of resolving one forensic chain against indexed documentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Grounded remediation text from the inference capability.
    pub solution: String,
    /// Tags the retrieval was filtered by (derived or fallback).
    pub tags_used: Vec<String>,
    /// Distinct document sources that grounded the answer.
    pub sources: Vec<String>,
    /// How many document chunks matched the query.
    pub document_matches: usize,
}
