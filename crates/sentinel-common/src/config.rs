//! Configuration for the sentinel daemon.
//!
//! Loads settings from /etc/sentinel/config.toml or uses defaults. Every
//! field has a serde default so a partial file is always valid.

use crate::severity::SeverityClassifier;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/sentinel/config.toml";

/// Fallback config file path
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/sentinel/config.toml";

/// Rolling history and queue consumption settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Rolling history window size W (entries kept for backtracking)
    #[serde(default = "default_history_window")]
    pub history_window_size: usize,

    /// Queue poll interval in milliseconds when the queue is empty
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_history_window() -> usize {
    100 // larger history for longer incident chains
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            history_window_size: default_history_window(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Retry discipline for the remote resolution call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed backoff between attempts in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Inference and embedding backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Base URL of the inference endpoint
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Embedding model id
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chat model id for grounded generation and tag derivation
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Sampling temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token cap for the generated solution
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Grounded generation timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Embedding timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub embedding_timeout_secs: u64,

    /// Tag derivation timeout in seconds
    #[serde(default = "default_tagging_timeout")]
    pub tagging_timeout_secs: u64,
}

fn default_ai_endpoint() -> String {
    "https://router.huggingface.co".to_string()
}

fn default_api_key_env() -> String {
    "HF_TOKEN".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_chat_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    500
}

fn default_generation_timeout() -> u64 {
    90
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_tagging_timeout() -> u64 {
    30
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key_env: default_api_key_env(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            generation_timeout_secs: default_generation_timeout(),
            embedding_timeout_secs: default_embedding_timeout(),
            tagging_timeout_secs: default_tagging_timeout(),
        }
    }
}

/// Document index (vector search) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the document index service
    #[serde(default)]
    pub index_url: String,

    /// Environment variable holding the index service key
    #[serde(default = "default_index_key_env")]
    pub index_key_env: String,

    /// Cosine similarity threshold for a chunk to count as a match
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Maximum number of chunks retrieved per query
    #[serde(default = "default_match_count")]
    pub match_count: usize,

    /// Tags substituted when tag derivation fails
    #[serde(default = "default_fallback_tags")]
    pub fallback_tags: Vec<String>,
}

fn default_index_key_env() -> String {
    "SUPABASE_KEY".to_string()
}

fn default_match_threshold() -> f32 {
    0.2
}

fn default_match_count() -> usize {
    3
}

fn default_fallback_tags() -> Vec<String> {
    vec!["incident-response".to_string()]
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_url: String::new(),
            index_key_env: default_index_key_env(),
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            fallback_tags: default_fallback_tags(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub search: SearchConfig,

    /// Severity keyword tables
    #[serde(default)]
    pub severity: SeverityClassifier,
}

impl Config {
    /// Load config from the standard paths, or return defaults.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            })
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
