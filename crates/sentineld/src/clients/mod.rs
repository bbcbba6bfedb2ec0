//! Remote capability seams: language model and document index.
//!
//! The dispatcher only ever talks to these traits. Real implementations
//! live in [`huggingface`] and [`supabase`]; [`fake`] has scripted clients
//! for tests.

pub mod fake;
pub mod huggingface;
pub mod supabase;

use async_trait::async_trait;
use sentinel_common::error::UpstreamError;
use serde::{Deserialize, Serialize};

/// One retrieved documentation chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMatch {
    /// Chunk text used to ground the answer.
    pub content: String,
    /// Originating document (file name or URL).
    pub source: String,
    /// Tags the chunk was indexed under.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Embedding, grounded generation, and tag derivation.
///
/// All three are opaque remote capabilities; the daemon never looks inside
/// a vector or second-guesses the model's text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Embed `text` into a fixed-length query vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;

    /// Grounded completion: answer `user` under the `system` instruction.
    async fn complete(&self, system: &str, user: &str) -> Result<String, UpstreamError>;

    /// Derive 2-5 lowercase technical search tags for an incident story.
    async fn derive_tags(&self, story: &str) -> Result<Vec<String>, UpstreamError>;
}

/// Tag-filtered similarity search over indexed documentation.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Return up to `limit` chunks above `threshold` similarity that carry
    /// at least one of the required `tags`. May legitimately return empty.
    async fn search(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
        tags: &[String],
    ) -> Result<Vec<DocumentMatch>, UpstreamError>;
}
