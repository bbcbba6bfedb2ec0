//! Resolution dispatcher.
//!
//! Turns a forensic chain into a grounded remediation: derive search tags,
//! embed the crash line, retrieve tag-filtered documentation, and generate
//! an answer constrained to that context. The remote leg (embed, search,
//! generate) runs as one bounded retry loop with fixed backoff; tag
//! derivation failure falls back to configured tags and never blocks the
//! diagnosis.

use crate::clients::{DocumentIndex, LanguageModel};
use sentinel_common::chain::{ForensicChain, ResolutionResult};
use sentinel_common::config::{RetryConfig, SearchConfig};
use sentinel_common::error::{SentinelError, UpstreamError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are Ops-Sentinel, an incident response automation system. \
STRICT RULE: Only provide solutions found in the \"SRE Documentation Context\". \
If the context is empty or doesn't match the error, state: \
\"No matching playbook found. Proceed with manual DB/Cache check.\" \
DO NOT suggest general commands unless they are in the context.";

/// Marker handed to the model when retrieval produced nothing.
pub const NO_CONTEXT_MARKER: &str = "No context available.";

pub struct ResolutionDispatcher {
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn DocumentIndex>,
    retry: RetryConfig,
    search: SearchConfig,
    shutdown: watch::Receiver<bool>,
}

impl ResolutionDispatcher {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        index: Arc<dyn DocumentIndex>,
        retry: RetryConfig,
        search: SearchConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            model,
            index,
            retry,
            search,
            shutdown,
        }
    }

    /// Resolve one chain. Fails with `InvalidChain` before any network
    /// call, or `UpstreamUnavailable` once retries are exhausted.
    pub async fn resolve(&self, chain: &ForensicChain) -> Result<ResolutionResult, SentinelError> {
        if chain.is_empty() {
            return Err(SentinelError::InvalidChain);
        }

        let tags = self.derive_tags(chain).await;
        info!(tags = ?tags, incident = %chain.id, "searching documentation");

        let max_attempts = self.retry.max_retries + 1;
        let backoff = Duration::from_millis(self.retry.backoff_ms);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.resolve_remote(chain, &tags).await {
                Ok(mut result) => {
                    result.tags_used = tags;
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    warn!(
                        attempt = attempts,
                        remaining = max_attempts - attempts,
                        "resolution attempt failed ({}), retrying in {:?}",
                        e,
                        backoff
                    );
                    if self.wait_backoff(backoff).await {
                        // Shutting down: don't retry past cancellation.
                        return Err(SentinelError::UpstreamUnavailable {
                            attempts,
                            source: e,
                        });
                    }
                }
                Err(e) => {
                    return Err(SentinelError::UpstreamUnavailable {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    /// Step 1: tag derivation. Non-fatal by design; failure or an empty
    /// reply substitutes the configured fallback tags.
    async fn derive_tags(&self, chain: &ForensicChain) -> Vec<String> {
        match self.model.derive_tags(&chain.joined()).await {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => {
                warn!("tag derivation returned nothing, using fallback tags");
                self.search.fallback_tags.clone()
            }
            Err(e) => {
                warn!("tag derivation failed ({}), using fallback tags", e);
                self.search.fallback_tags.clone()
            }
        }
    }

    /// Steps 2-4 as a single retryable remote call: embed the crash line,
    /// retrieve grounding, generate the answer.
    async fn resolve_remote(
        &self,
        chain: &ForensicChain,
        tags: &[String],
    ) -> Result<ResolutionResult, UpstreamError> {
        let crash_line = chain.crash_line().unwrap_or_default();
        let query = self.model.embed(crash_line).await?;

        // An erroring or empty index is "no grounding available", not a
        // dispatch failure.
        let matches = match self
            .index
            .search(
                &query,
                self.search.match_threshold,
                self.search.match_count,
                tags,
            )
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("document search failed ({}), answering ungrounded", e);
                Vec::new()
            }
        };

        let context = if matches.is_empty() {
            NO_CONTEXT_MARKER.to_string()
        } else {
            matches
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n---\n\n")
        };

        let user = format!(
            "SRE Documentation Context:\n{}\n\nIncident Story:\n{}",
            context,
            chain.joined()
        );
        let solution = self.model.complete(SYSTEM_PROMPT, &user).await?;

        let sources: Vec<String> = matches
            .iter()
            .filter(|m| !m.source.is_empty())
            .map(|m| m.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(ResolutionResult {
            solution,
            tags_used: Vec::new(), // filled by the caller with the tags actually used
            sources,
            document_matches: matches.len(),
        })
    }

    /// Sleep the fixed backoff, aborting early on shutdown. Returns true
    /// when the daemon is shutting down.
    async fn wait_backoff(&self, backoff: Duration) -> bool {
        if *self.shutdown.borrow() {
            return true;
        }
        let mut shutdown = self.shutdown.clone();
        let closed = tokio::select! {
            _ = tokio::time::sleep(backoff) => return false,
            changed = shutdown.changed() => changed.is_err(),
        };
        // A dropped sender means the daemon is tearing down.
        closed || *shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fake::{doc, FakeIndex, FakeModel};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            backoff_ms: 5,
        }
    }

    fn dispatcher(
        model: Arc<FakeModel>,
        index: Arc<FakeIndex>,
    ) -> (ResolutionDispatcher, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let d = ResolutionDispatcher::new(model, index, fast_retry(), SearchConfig::default(), rx);
        (d, tx)
    }

    fn chain(lines: &[&str]) -> ForensicChain {
        ForensicChain::new(lines.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn test_empty_chain_rejected_before_any_call() {
        let model = Arc::new(FakeModel::healthy("n/a", vec!["x".to_string()]));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let err = d.resolve(&chain(&[])).await.unwrap_err();
        assert!(matches!(err, SentinelError::InvalidChain));
        assert_eq!(model.embed_calls(), 0);
        assert_eq!(model.tag_calls(), 0);
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_grounded_resolution_dedupes_sources() {
        let model = Arc::new(FakeModel::healthy(
            "raise --max-old-space-size",
            vec!["nodejs".to_string(), "memory".to_string()],
        ));
        let index = Arc::new(FakeIndex::returning(vec![
            doc("chunk one", "node-runbook.pdf", &["nodejs"]),
            doc("chunk two", "node-runbook.pdf", &["memory"]),
            doc("chunk three", "gc-guide.pdf", &["memory"]),
        ]));
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let result = d
            .resolve(&chain(&["WARN heap 95%", "FATAL heap out of memory"]))
            .await
            .unwrap();
        assert_eq!(result.solution, "raise --max-old-space-size");
        assert_eq!(result.tags_used, vec!["nodejs", "memory"]);
        assert_eq!(result.document_matches, 3);
        assert_eq!(result.sources, vec!["gc-guide.pdf", "node-runbook.pdf"]);
        assert_eq!(index.last_tags(), vec!["nodejs", "memory"]);
    }

    #[tokio::test]
    async fn test_tag_failure_uses_fallback_and_still_resolves() {
        let model = Arc::new(FakeModel::scripted(
            vec![Ok(vec![0.5])],
            vec![Ok("answer".to_string())],
            vec![Err(UpstreamError::Failed("tagging broke".to_string()))],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let result = d.resolve(&chain(&["FATAL crash"])).await.unwrap();
        assert_eq!(result.tags_used, vec!["incident-response"]);
        assert_eq!(index.last_tags(), vec!["incident-response"]);
    }

    #[tokio::test]
    async fn test_retries_exhaust_after_n_plus_one_attempts() {
        let model = Arc::new(FakeModel::scripted(
            vec![Err(UpstreamError::Busy(503))],
            vec![Ok("never reached".to_string())],
            vec![Ok(vec!["memory".to_string()])],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let err = d.resolve(&chain(&["FATAL crash"])).await.unwrap_err();
        match err {
            SentinelError::UpstreamUnavailable { attempts, source } => {
                assert_eq!(attempts, 3); // max_retries = 2
                assert!(source.is_retryable());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(model.embed_calls(), 3);
        // Tags were derived once, not per attempt.
        assert_eq!(model.tag_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let model = Arc::new(FakeModel::scripted(
            vec![Err(UpstreamError::Timeout(30)), Ok(vec![0.1])],
            vec![Ok("recovered".to_string())],
            vec![Ok(vec!["redis".to_string()])],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let result = d.resolve(&chain(&["FATAL crash"])).await.unwrap();
        assert_eq!(result.solution, "recovered");
        assert_eq!(model.embed_calls(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_surfaces_immediately() {
        let model = Arc::new(FakeModel::scripted(
            vec![Err(UpstreamError::Failed("bad request".to_string()))],
            vec![Ok("never".to_string())],
            vec![Ok(vec!["x".to_string()])],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let err = d.resolve(&chain(&["FATAL crash"])).await.unwrap_err();
        match err {
            SentinelError::UpstreamUnavailable { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(model.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_search_error_is_treated_as_empty_grounding() {
        let model = Arc::new(FakeModel::healthy(
            "No matching playbook found. Proceed with manual DB/Cache check.",
            vec!["memory".to_string()],
        ));
        let index = Arc::new(FakeIndex::scripted(vec![Err(UpstreamError::Failed(
            "index down".to_string(),
        ))]));
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        let result = d.resolve(&chain(&["FATAL crash"])).await.unwrap();
        assert_eq!(result.document_matches, 0);
        assert!(result.sources.is_empty());
        // Generation still happened, once.
        assert_eq!(model.complete_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_retrieval_round_trips_no_playbook_answer() {
        let model = Arc::new(FakeModel::healthy(
            "No matching playbook found. Proceed with manual DB/Cache check.",
            vec!["incident-response".to_string()],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (d, _shutdown) = dispatcher(Arc::clone(&model), Arc::clone(&index));

        // Isolated crash: single-line chain, no grounding available.
        let result = d.resolve(&chain(&["FATAL alone"])).await.unwrap();
        assert!(result.solution.contains("No matching playbook found"));
        assert_eq!(result.document_matches, 0);
        // The model was told explicitly that there is no context.
        assert!(model.last_user_prompt().contains(NO_CONTEXT_MARKER));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_pending_retries() {
        let model = Arc::new(FakeModel::scripted(
            vec![Err(UpstreamError::Busy(503))],
            vec![Ok("never".to_string())],
            vec![Ok(vec!["x".to_string()])],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (tx, rx) = watch::channel(false);
        let d = ResolutionDispatcher::new(
            Arc::clone(&model) as Arc<dyn LanguageModel>,
            index,
            RetryConfig {
                max_retries: 5,
                backoff_ms: 10_000,
            },
            SearchConfig::default(),
            rx,
        );

        let chain = chain(&["FATAL crash"]);
        let resolve = d.resolve(&chain);
        tokio::pin!(resolve);

        // Let the first attempt fail and the backoff start, then cancel.
        tokio::select! {
            _ = &mut resolve => panic!("should still be backing off"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        tx.send(true).unwrap();

        let err = tokio::time::timeout(Duration::from_secs(1), resolve)
            .await
            .expect("must abort promptly on shutdown")
            .unwrap_err();
        assert!(matches!(
            err,
            SentinelError::UpstreamUnavailable { attempts: 1, .. }
        ));
        assert_eq!(model.embed_calls(), 1);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_retrying() {
        let model = Arc::new(FakeModel::scripted(
            vec![Err(UpstreamError::Busy(503))],
            vec![Ok("never".to_string())],
            vec![Ok(vec!["x".to_string()])],
        ));
        let index = Arc::new(FakeIndex::empty());
        let (tx, rx) = watch::channel(false);
        let d = ResolutionDispatcher::new(
            Arc::clone(&model) as Arc<dyn LanguageModel>,
            index,
            RetryConfig {
                max_retries: 5,
                backoff_ms: 10_000,
            },
            SearchConfig::default(),
            rx,
        );
        drop(tx);

        // With no sender left the backoff must not spin through retries;
        // the first failure surfaces immediately.
        let err = tokio::time::timeout(Duration::from_secs(1), d.resolve(&chain(&["FATAL crash"])))
            .await
            .expect("must stop promptly once the sender is gone")
            .unwrap_err();
        assert!(matches!(
            err,
            SentinelError::UpstreamUnavailable { attempts: 1, .. }
        ));
        assert_eq!(model.embed_calls(), 1);
    }
}
