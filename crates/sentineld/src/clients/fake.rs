//! Scripted capability clients for tests.
//!
//! Each fake holds a queue of pre-programmed responses and a call counter.
//! When the queue runs out the last response repeats, so "always busy" and
//! "always succeeds" scenarios need a single entry.

use crate::clients::{DocumentIndex, DocumentMatch, LanguageModel};
use async_trait::async_trait;
use sentinel_common::error::UpstreamError;
use std::sync::Mutex;

type ScriptedResult<T> = Result<T, UpstreamError>;

fn next_response<T: Clone>(queue: &Mutex<Vec<ScriptedResult<T>>>) -> ScriptedResult<T> {
    let mut responses = queue.lock().unwrap();
    if responses.len() > 1 {
        responses.remove(0)
    } else {
        responses
            .first()
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::Failed("no scripted response".to_string())))
    }
}

/// Scripted [`LanguageModel`].
pub struct FakeModel {
    embed_responses: Mutex<Vec<ScriptedResult<Vec<f32>>>>,
    complete_responses: Mutex<Vec<ScriptedResult<String>>>,
    tag_responses: Mutex<Vec<ScriptedResult<Vec<String>>>>,
    embed_calls: Mutex<usize>,
    complete_calls: Mutex<usize>,
    tag_calls: Mutex<usize>,
    last_user_prompt: Mutex<String>,
}

impl FakeModel {
    /// A model that succeeds at everything with canned output.
    pub fn healthy(solution: &str, tags: Vec<String>) -> Self {
        Self::scripted(
            vec![Ok(vec![0.1, 0.2, 0.3])],
            vec![Ok(solution.to_string())],
            vec![Ok(tags)],
        )
    }

    pub fn scripted(
        embed_responses: Vec<ScriptedResult<Vec<f32>>>,
        complete_responses: Vec<ScriptedResult<String>>,
        tag_responses: Vec<ScriptedResult<Vec<String>>>,
    ) -> Self {
        Self {
            embed_responses: Mutex::new(embed_responses),
            complete_responses: Mutex::new(complete_responses),
            tag_responses: Mutex::new(tag_responses),
            embed_calls: Mutex::new(0),
            complete_calls: Mutex::new(0),
            tag_calls: Mutex::new(0),
            last_user_prompt: Mutex::new(String::new()),
        }
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }

    pub fn complete_calls(&self) -> usize {
        *self.complete_calls.lock().unwrap()
    }

    pub fn tag_calls(&self) -> usize {
        *self.tag_calls.lock().unwrap()
    }

    /// The user content of the most recent completion request.
    pub fn last_user_prompt(&self) -> String {
        self.last_user_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, UpstreamError> {
        *self.embed_calls.lock().unwrap() += 1;
        next_response(&self.embed_responses)
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String, UpstreamError> {
        *self.complete_calls.lock().unwrap() += 1;
        *self.last_user_prompt.lock().unwrap() = user.to_string();
        next_response(&self.complete_responses)
    }

    async fn derive_tags(&self, _story: &str) -> Result<Vec<String>, UpstreamError> {
        *self.tag_calls.lock().unwrap() += 1;
        next_response(&self.tag_responses)
    }
}

/// Scripted [`DocumentIndex`].
pub struct FakeIndex {
    responses: Mutex<Vec<ScriptedResult<Vec<DocumentMatch>>>>,
    calls: Mutex<usize>,
    last_tags: Mutex<Vec<String>>,
}

impl FakeIndex {
    pub fn returning(matches: Vec<DocumentMatch>) -> Self {
        Self::scripted(vec![Ok(matches)])
    }

    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub fn scripted(responses: Vec<ScriptedResult<Vec<DocumentMatch>>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
            last_tags: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Tags the most recent search was filtered by.
    pub fn last_tags(&self) -> Vec<String> {
        self.last_tags.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentIndex for FakeIndex {
    async fn search(
        &self,
        _query: &[f32],
        _threshold: f32,
        _limit: usize,
        tags: &[String],
    ) -> Result<Vec<DocumentMatch>, UpstreamError> {
        *self.calls.lock().unwrap() += 1;
        *self.last_tags.lock().unwrap() = tags.to_vec();
        next_response(&self.responses)
    }
}

/// Convenience for building a match in tests.
pub fn doc(content: &str, source: &str, tags: &[&str]) -> DocumentMatch {
    DocumentMatch {
        content: content.to_string(),
        source: source.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}
