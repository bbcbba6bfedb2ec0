//! Ordered ingest queue feeding the consumption loop.
//!
//! A trait seam so the daemon core never touches a concrete transport: the
//! binary feeds a [`MemoryQueue`] from stdin, tests feed it directly, and a
//! store-backed implementation can slot in without touching the engine.

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Shared FIFO of raw log lines. Producers push at the tail; the single
/// consumption loop pops from the head, preserving arrival order.
#[async_trait]
pub trait LogQueue: Send + Sync {
    /// Append a line at the tail (normal production path).
    async fn push_tail(&self, line: String);

    /// Re-insert a line at the head (used to undo a pop).
    async fn push_head(&self, line: String);

    /// Pop the oldest line, or `None` when the queue is empty.
    async fn pop_head(&self) -> Option<String>;

    /// Number of lines currently buffered.
    async fn len(&self) -> usize;
}

/// In-process queue over a mutex-guarded deque.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogQueue for MemoryQueue {
    async fn push_tail(&self, line: String) {
        self.inner.lock().await.push_back(line);
    }

    async fn push_head(&self, line: String) {
        self.inner.lock().await.push_front(line);
    }

    async fn pop_head(&self) -> Option<String> {
        self.inner.lock().await.pop_front()
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
