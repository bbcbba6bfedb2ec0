//! Keyword-driven severity classification for raw log lines.
//!
//! Matching is case-insensitive substring containment, the same rule for
//! every class. A line may belong to several classes at once: "FATAL" is
//! both a critical trigger and a causal signal, which is what lets a crash
//! line anchor its own forensic chain.

use serde::{Deserialize, Serialize};

/// Severity classes a log line can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Terminal failure: triggers forensic extraction.
    Critical,
    /// Hard error worth keeping in a chain, but not a trigger on its own.
    Error,
    /// Plausible contributing condition (resource pressure, retry language).
    CausalSignal,
}

/// Keyword table mapping severity classes to their trigger words.
///
/// Supplied once at startup (normally from config) and never mutated at
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityClassifier {
    /// Keywords marking a terminal failure.
    #[serde(default = "default_critical")]
    pub critical: Vec<String>,

    /// Keywords marking a hard error.
    #[serde(default = "default_error")]
    pub error: Vec<String>,

    /// Keywords marking a causal "cause candidate" signal.
    #[serde(default = "default_causal_signals")]
    pub causal_signals: Vec<String>,
}

fn default_critical() -> Vec<String> {
    [
        "FATAL",
        "CRASH",
        "heap out of memory",
        "out of memory",
        "ENOSPC",
        "No space left on device",
        "READONLY",
        "Service degradation",
        "Cannot connect",
        "control plane unreachable",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_error() -> Vec<String> {
    [
        "ERROR",
        "FAIL",
        "ECONNREFUSED",
        "ENETUNREACH",
        "timeout",
        "failed",
        "unable to",
        "Cannot",
        "cascading failure",
        "health check failed",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_causal_signals() -> Vec<String> {
    [
        "WARN",
        "ERROR",
        "FATAL",
        "limit",
        "slow",
        "retry",
        "threshold",
        "GC",
        "latency",
        "timeout",
        "exhausted",
        "degraded",
        "pressure",
        "pool",
        "connection",
        "lag",
        "fragmentation",
        "growth",
        "spike",
        "cascading",
        "unreachable",
        "loss",
        "ECONNREFUSED",
        "ENETUNREACH",
        "OOM",
        "heap out of memory",
        "ENOSPC",
        "No space left",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self {
            critical: default_critical(),
            error: default_error(),
            causal_signals: default_causal_signals(),
        }
    }
}

fn matches_any(keywords: &[String], upper_line: &str) -> bool {
    keywords
        .iter()
        .any(|k| upper_line.contains(&k.to_uppercase()))
}

impl SeverityClassifier {
    /// Build a classifier from explicit keyword sets.
    pub fn new(critical: Vec<String>, error: Vec<String>, causal_signals: Vec<String>) -> Self {
        Self {
            critical,
            error,
            causal_signals,
        }
    }

    /// Does this line mark a terminal failure?
    pub fn is_critical(&self, line: &str) -> bool {
        matches_any(&self.critical, &line.to_uppercase())
    }

    /// Does this line carry a causal "cause candidate" signal?
    pub fn is_causal_signal(&self, line: &str) -> bool {
        matches_any(&self.causal_signals, &line.to_uppercase())
    }

    /// Does this line match any class at all (chain-worthy vs pure noise)?
    pub fn is_signal(&self, line: &str) -> bool {
        let upper = line.to_uppercase();
        matches_any(&self.critical, &upper)
            || matches_any(&self.error, &upper)
            || matches_any(&self.causal_signals, &upper)
    }

    /// All classes the line belongs to. Containment is not exclusive.
    pub fn classify(&self, line: &str) -> Vec<Severity> {
        let upper = line.to_uppercase();
        let mut classes = Vec::new();
        if matches_any(&self.critical, &upper) {
            classes.push(Severity::Critical);
        }
        if matches_any(&self.error, &upper) {
            classes.push(Severity::Error);
        }
        if matches_any(&self.causal_signals, &upper) {
            classes.push(Severity::CausalSignal);
        }
        classes
    }
}
