//! Single consumption loop driving the pipeline.
//!
//! One long-lived task pops lines from the queue in arrival order and runs
//! observe -> resolve -> evict strictly sequentially, so at most one chain
//! is ever in flight and the rolling history is never mutated concurrently.

use crate::cleanup;
use crate::dispatcher::ResolutionDispatcher;
use crate::engine::ForensicEngine;
use crate::queue::LogQueue;
use sentinel_common::error::SentinelError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct Monitor {
    queue: Arc<dyn LogQueue>,
    engine: ForensicEngine,
    dispatcher: ResolutionDispatcher,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Monitor {
    pub fn new(
        queue: Arc<dyn LogQueue>,
        engine: ForensicEngine,
        dispatcher: ResolutionDispatcher,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            engine,
            dispatcher,
            poll_interval,
            shutdown,
        }
    }

    /// Run until shutdown. Polls the queue at the configured interval when
    /// it is empty.
    pub async fn run(mut self) {
        info!("forensic monitor active");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            if !self.tick().await {
                let mut shutdown = self.shutdown.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
        info!("forensic monitor stopped");
    }

    /// Process at most one queued line. Returns whether a line was
    /// consumed, so callers know to back off when the queue is empty.
    pub async fn tick(&mut self) -> bool {
        let Some(line) = self.queue.pop_head().await else {
            return false;
        };

        let Some(extraction) = self.engine.observe(&line) else {
            return true;
        };

        info!(
            incident = %extraction.chain.id,
            chain_len = extraction.chain.len(),
            "fatal event detected, dispatching forensic chain"
        );

        match self.dispatcher.resolve(&extraction.chain).await {
            Ok(result) => {
                info!(
                    incident = %extraction.chain.id,
                    tags = ?result.tags_used,
                    matches = result.document_matches,
                    sources = ?result.sources,
                    "incident resolved"
                );
                info!(incident = %extraction.chain.id, "solution: {}", result.solution);
            }
            Err(SentinelError::UpstreamUnavailable { attempts, source }) => {
                error!(
                    incident = %extraction.chain.id,
                    attempts,
                    "resolution service unavailable ({}), try again later",
                    source
                );
            }
            Err(e) => {
                warn!(incident = %extraction.chain.id, "resolution failed: {}", e);
            }
        }

        // Cleanup runs whether or not resolution succeeded, so the same
        // incident is never reprocessed and the history stays bounded.
        let removed = cleanup::evict_resolved(self.engine.history_mut(), &extraction.contributing);
        info!(
            incident = %extraction.chain.id,
            removed,
            "history cleanup complete"
        );
        true
    }

    /// Current rolling history depth (test and status hook).
    pub fn history_len(&self) -> usize {
        self.engine.history().len()
    }
}
