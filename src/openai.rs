//! Minimal OpenAI-compatible chat client (Groq by default).
//!
//! We only call `chat/completions` for plain text and `models` to check that a
//! checkpoint is served. Calls are instrumented and log model names, latencies
//! and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

const REQUEST_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ChatError {
  #[error("request timed out after {0}s")]
  Timeout(u64),

  #[error("network error: {0}")]
  Network(String),

  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },

  #[error("malformed response: {0}")]
  Malformed(String),
}

impl From<reqwest::Error> for ChatError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      ChatError::Timeout(REQUEST_TIMEOUT_SECS)
    } else {
      ChatError::Network(e.to_string())
    }
  }
}

#[derive(Clone)]
pub struct ChatClient {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl std::fmt::Debug for ChatClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChatClient")
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .finish_non_exhaustive()
  }
}

impl ChatClient {
  pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, ChatError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()?;
    Ok(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      model: model.to_string(),
    })
  }

  /// Plain-text chat completion with a system and a user message. Single attempt.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, user_len = user.len()))]
  pub async fn chat_plain(
    &self,
    system: Option<&str>,
    user: &str,
    temperature: f32,
    max_tokens: Option<u32>,
  ) -> Result<String, ChatError> {
    let url = format!("{}/chat/completions", self.base_url);
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
      messages.push(ChatMessageReq { role: "system".into(), content: system.into() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: user.into() });
    let req = ChatCompletionRequest { model: self.model.clone(), messages, temperature, max_tokens };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "situate-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(ChatError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| ChatError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Chat usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .ok_or_else(|| ChatError::Malformed("no completion choices".into()))?
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Chat completion received");
    Ok(text)
  }

  /// Ids of the models served by this endpoint.
  #[instrument(level = "info", skip(self), fields(base_url = %self.base_url))]
  pub async fn list_models(&self) -> Result<Vec<String>, ChatError> {
    let url = format!("{}/models", self.base_url);
    let res = self.client.get(&url)
      .header(USER_AGENT, "situate-backend/0.1")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      return Err(ChatError::Api { status, message });
    }

    let body: ModelList = res.json().await.map_err(|e| ChatError::Malformed(e.to_string()))?;
    Ok(body.data.into_iter().map(|m| m.id).collect())
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ModelList { data: Vec<ModelEntry> }
#[derive(Deserialize)]
struct ModelEntry { id: String }

/// Try to extract a clean error message from an `{"error": {"message": ..}}` body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
