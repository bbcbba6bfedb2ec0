//! Forensic extraction engine.
//!
//! Consumes one log line at a time, maintains the rolling history, and on a
//! critical line runs the backward pivot search to reconstruct the causal
//! chain that led to the crash.

use crate::history::RollingHistory;
use sentinel_common::chain::ForensicChain;
use sentinel_common::severity::SeverityClassifier;
use tracing::debug;

/// A detected incident: the filtered chronological chain plus the exact raw
/// span that produced it.
///
/// `contributing` keeps the noise lines that were filtered out of the chain;
/// the cleanup pass needs them and they cannot be reconstructed afterwards.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Chronological, noise-filtered chain. Crash last.
    pub chain: ForensicChain,
    /// Every history entry in the chain's span, chronological, unfiltered.
    pub contributing: Vec<String>,
}

/// Owns the rolling history and turns critical lines into forensic chains.
#[derive(Debug)]
pub struct ForensicEngine {
    history: RollingHistory,
    classifier: SeverityClassifier,
}

impl ForensicEngine {
    /// Create an engine with window size `window` and the given keyword
    /// tables.
    pub fn new(window: usize, classifier: SeverityClassifier) -> Self {
        Self {
            history: RollingHistory::new(window),
            classifier,
        }
    }

    /// Feed one log line, in arrival order.
    ///
    /// Always records the line in the rolling history first. Returns an
    /// extraction only when the line matches a critical keyword; everything
    /// else is the cheap noise path.
    pub fn observe(&mut self, line: &str) -> Option<Extraction> {
        self.history.push(line.to_string());

        if !self.classifier.is_critical(line) {
            return None;
        }

        let snapshot = self.history.snapshot();

        // Walk the most-recent-first snapshot towards older entries, and keep
        // overwriting the pivot on every causal-signal hit. The last write is
        // the deepest match, i.e. the earliest signal in time.
        let mut pivot: Option<usize> = None;
        for (i, entry) in snapshot.iter().enumerate() {
            if self.classifier.is_causal_signal(entry) {
                pivot = Some(i);
            }
        }

        let (chain_lines, contributing) = match pivot {
            Some(p) => {
                // Span from the crash (index 0) back to the pivot, flipped to
                // chronological order.
                let mut span: Vec<String> = snapshot[..=p].to_vec();
                span.reverse();

                let filtered: Vec<String> = span
                    .iter()
                    .filter(|l| self.classifier.is_signal(l))
                    .cloned()
                    .collect();
                (filtered, span)
            }
            // Isolated crash: no inferable cause in the window.
            None => (vec![line.to_string()], vec![line.to_string()]),
        };

        debug!(
            span = contributing.len(),
            chain = chain_lines.len(),
            "critical line triggered forensic extraction"
        );

        Some(Extraction {
            chain: ForensicChain::new(chain_lines),
            contributing,
        })
    }

    /// The rolling history, for cleanup after a chain has been dispatched.
    pub fn history_mut(&mut self) -> &mut RollingHistory {
        &mut self.history
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SeverityClassifier {
        SeverityClassifier::new(
            vec!["FATAL".into()],
            vec!["ERROR".into()],
            vec!["WARN".into(), "ERROR".into(), "FATAL".into()],
        )
    }

    fn engine(window: usize) -> ForensicEngine {
        ForensicEngine::new(window, classifier())
    }

    #[test]
    fn test_noise_returns_none() {
        let mut e = engine(10);
        assert!(e.observe("INFO: heartbeat").is_none());
        assert!(e.observe("INFO: user logged in").is_none());
        assert_eq!(e.history().len(), 2);
    }

    #[test]
    fn test_causal_chain_is_chronological_and_noise_filtered() {
        let mut e = engine(10);
        let feed = [
            "INFO x",
            "WARN cause",
            "INFO y",
            "ERROR build",
            "FATAL crash",
        ];
        let mut extraction = None;
        for line in feed {
            extraction = e.observe(line).or(extraction);
        }
        let extraction = extraction.expect("fatal line must trigger extraction");
        assert_eq!(
            extraction.chain.lines,
            vec!["WARN cause", "ERROR build", "FATAL crash"]
        );
        // The raw span still holds the interleaved noise for cleanup.
        assert_eq!(
            extraction.contributing,
            vec!["WARN cause", "INFO y", "ERROR build", "FATAL crash"]
        );
    }

    #[test]
    fn test_pivot_keeps_earliest_signal_in_time() {
        let mut e = engine(10);
        let feed = [
            "WARN first pressure",
            "INFO noise",
            "WARN second pressure",
            "FATAL crash",
        ];
        let mut extraction = None;
        for line in feed {
            extraction = e.observe(line).or(extraction);
        }
        let chain = extraction.unwrap().chain;
        // The chain reaches all the way back to the earliest signal, not
        // just the most recent one.
        assert_eq!(chain.lines[0], "WARN first pressure");
        assert_eq!(chain.crash_line(), Some("FATAL crash"));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_isolated_crash_yields_single_line_chain() {
        let mut e = engine(10);
        assert!(e.observe("INFO a").is_none());
        assert!(e.observe("INFO b").is_none());
        let extraction = e.observe("FATAL alone").unwrap();
        // FATAL is itself a causal signal so the pivot lands on the crash
        // line; either way the chain is exactly the crash.
        assert_eq!(extraction.chain.lines, vec!["FATAL alone"]);
        assert_eq!(extraction.contributing, vec!["FATAL alone"]);
    }

    #[test]
    fn test_no_causal_signal_anywhere_yields_crash_only() {
        // Classifier where the critical keyword is NOT a causal signal, so
        // a truly isolated crash exercises the no-pivot branch.
        let c = SeverityClassifier::new(
            vec!["PANIC".into()],
            vec!["ERR".into()],
            vec!["WARN".into()],
        );
        let mut e = ForensicEngine::new(10, c);
        assert!(e.observe("INFO a").is_none());
        assert!(e.observe("INFO b").is_none());
        let extraction = e.observe("PANIC: gone").unwrap();
        assert_eq!(extraction.chain.lines, vec!["PANIC: gone"]);
    }

    #[test]
    fn test_signals_outside_window_are_unreachable() {
        let mut e = engine(2);
        assert!(e.observe("WARN old cause").is_none());
        assert!(e.observe("INFO filler one").is_none());
        assert!(e.observe("INFO filler two").is_none()); // WARN has now fallen off the tail
        let extraction = e.observe("FATAL crash").unwrap();
        assert_eq!(extraction.chain.lines, vec!["FATAL crash"]);
    }

    #[test]
    fn test_history_stays_bounded_under_load() {
        let mut e = engine(5);
        for i in 0..50 {
            assert!(e.observe(&format!("INFO line {}", i)).is_none());
            assert!(e.history().len() <= 5);
        }
    }
}
