//! Hugging Face inference client.
//!
//! Embeddings go through the feature-extraction pipeline, generation and
//! tag derivation through the OpenAI-compatible chat endpoint. Timeouts
//! are per call: generation gets the long budget, embedding and tagging
//! the short ones.

use crate::clients::LanguageModel;
use async_trait::async_trait;
use sentinel_common::config::AiConfig;
use sentinel_common::error::UpstreamError;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const TAG_PROMPT: &str = "Analyze this server incident/crash story. \
Return ONLY a comma-separated list of the 2-3 most relevant technical tags \
for searching a solution manual. \
Example: \"nodejs, memory\" or \"linux, disk-space\" or \"redis, timeout\".";

/// Hard cap on derived tags; anything past this is model chatter.
const MAX_TAGS: usize = 5;

pub struct HfClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    embedding_model: String,
    chat_model: String,
    temperature: f32,
    max_tokens: u32,
    generation_timeout: Duration,
    embedding_timeout: Duration,
    tagging_timeout: Duration,
}

/// The feature-extraction pipeline returns either a flat vector or a
/// one-row matrix depending on the model.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl HfClient {
    /// Build a client from config; the API token is read from the
    /// configured environment variable.
    pub fn new(config: &AiConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(
                "{} not set, inference calls will go out unauthenticated",
                config.api_key_env
            );
        }

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            embedding_timeout: Duration::from_secs(config.embedding_timeout_secs),
            tagging_timeout: Duration::from_secs(config.tagging_timeout_secs),
        })
    }

    fn map_send_error(e: reqwest::Error, timeout: Duration) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(timeout.as_secs())
        } else {
            UpstreamError::Failed(format!("request failed: {}", e))
        }
    }

    fn check_status(status: reqwest::StatusCode) -> Result<(), UpstreamError> {
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            429 | 503 => Err(UpstreamError::Busy(status.as_u16())),
            code => Err(UpstreamError::Failed(format!("HTTP {}", code))),
        }
    }

    async fn chat(
        &self,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/chat/completions", self.endpoint);

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user}));

        let body = serde_json::json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": max_tokens,
        });

        let mut request = self.http.post(&url).json(&body).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, timeout))?;
        Self::check_status(response.status())?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Failed(format!("invalid chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| UpstreamError::Failed("chat response had no choices".to_string()))
    }
}

#[async_trait]
impl LanguageModel for HfClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let url = format!(
            "{}/models/{}/pipeline/feature-extraction",
            self.endpoint, self.embedding_model
        );

        let mut request = self
            .http
            .post(&url)
            .json(&serde_json::json!({"inputs": text}))
            .timeout(self.embedding_timeout);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, self.embedding_timeout))?;
        Self::check_status(response.status())?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Failed(format!("invalid embedding response: {}", e)))?;

        let vector = match parsed {
            EmbeddingResponse::Flat(v) => v,
            EmbeddingResponse::Nested(rows) => rows.into_iter().next().unwrap_or_default(),
        };

        if vector.is_empty() {
            return Err(UpstreamError::Failed("empty embedding".to_string()));
        }
        Ok(vector)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, UpstreamError> {
        self.chat(Some(system), user, self.max_tokens, self.generation_timeout)
            .await
    }

    async fn derive_tags(&self, story: &str) -> Result<Vec<String>, UpstreamError> {
        let prompt = format!("{}\nStory: {}", TAG_PROMPT, story);
        let reply = self.chat(None, &prompt, 30, self.tagging_timeout).await?;

        let tags: Vec<String> = reply
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .take(MAX_TAGS)
            .collect();

        if tags.is_empty() {
            return Err(UpstreamError::Failed("model returned no tags".to_string()));
        }
        Ok(tags)
    }
}
