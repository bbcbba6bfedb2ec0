//! Supabase-backed document index.
//!
//! Calls the `match_document_chunks_with_tags` RPC: cosine search over
//! embedded documentation chunks, restricted to rows carrying at least one
//! of the required tags.

use crate::clients::{DocumentIndex, DocumentMatch};
use async_trait::async_trait;
use sentinel_common::config::SearchConfig;
use sentinel_common::error::UpstreamError;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const RPC_NAME: &str = "match_document_chunks_with_tags";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SupabaseIndex {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    metadata: MatchMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    source: String,
    #[serde(default)]
    tags: Vec<String>,
}

impl SupabaseIndex {
    /// Build an index client from config; the service key is read from the
    /// configured environment variable.
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.index_key_env).ok();
        if api_key.is_none() {
            warn!(
                "{} not set, document index calls will likely be rejected",
                config.index_key_env
            );
        }

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            url: config.index_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl DocumentIndex for SupabaseIndex {
    async fn search(
        &self,
        query: &[f32],
        threshold: f32,
        limit: usize,
        tags: &[String],
    ) -> Result<Vec<DocumentMatch>, UpstreamError> {
        let url = format!("{}/rest/v1/rpc/{}", self.url, RPC_NAME);

        let body = serde_json::json!({
            "query_embedding": query,
            "match_threshold": threshold,
            "match_count": limit,
            "filter_tags": tags,
        });

        let mut request = self.http.post(&url).json(&body).timeout(SEARCH_TIMEOUT);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(SEARCH_TIMEOUT.as_secs())
            } else {
                UpstreamError::Failed(format!("search request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return match status.as_u16() {
                429 | 503 => Err(UpstreamError::Busy(status.as_u16())),
                code => Err(UpstreamError::Failed(format!("HTTP {}", code))),
            };
        }

        let rows: Vec<MatchRow> = response
            .json()
            .await
            .map_err(|e| UpstreamError::Failed(format!("invalid search response: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|r| DocumentMatch {
                content: r.content,
                source: r.metadata.source,
                tags: r.metadata.tags,
            })
            .collect())
    }
}
