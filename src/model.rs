//! The generative grading capability.
//!
//! Loading is expensive and explicitly user-triggered. A successfully loaded
//! model stays resident for the rest of the process and is never loaded twice;
//! a failed load leaves the slot empty so it can be retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

use crate::config::GradingModelConfig;
use crate::error::AppError;
use crate::openai::ChatClient;

/// Something that writes feedback for a grading prompt.
#[async_trait]
pub trait GradingModel: Send + Sync {
  fn name(&self) -> &str;

  async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, AppError>;
}

/// Adapter parameters the checkpoint was tuned with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
  pub adapter_len: u32,
  pub adapter_layer: u32,
}

/// Adapter-tuned checkpoint served behind an OpenAI-compatible endpoint.
pub struct ChatGradingModel {
  client: ChatClient,
}

impl ChatGradingModel {
  /// Connect and verify that the checkpoint is actually served.
  #[instrument(level = "info", skip(cfg), fields(checkpoint = %cfg.checkpoint, base_url = %cfg.base_url))]
  pub async fn load(cfg: &GradingModelConfig) -> Result<Self, AppError> {
    let client = ChatClient::new(&cfg.api_key, &cfg.base_url, &cfg.checkpoint)
      .map_err(|e| AppError::external(format!("Failed to build grading model client: {}", e)))?;
    let served = client
      .list_models()
      .await
      .map_err(|e| AppError::external(format!("Failed to reach grading model endpoint: {}", e)))?;
    if !served.iter().any(|id| id == &cfg.checkpoint) {
      return Err(AppError::external(format!(
        "Checkpoint '{}' is not served by {}",
        cfg.checkpoint, cfg.base_url
      )));
    }
    info!(target: "quiz", adapter_len = cfg.adapter_len, adapter_layer = cfg.adapter_layer, "Grading model checkpoint verified");
    Ok(Self { client })
  }
}

#[async_trait]
impl GradingModel for ChatGradingModel {
  fn name(&self) -> &str {
    &self.client.model
  }

  async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<String, AppError> {
    self.client
      .chat_plain(None, prompt, 0.2, Some(max_new_tokens))
      .await
      .map_err(|e| AppError::external(e.to_string()))
  }
}

/// Result of a load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
  Loaded,
  AlreadyLoaded,
}

/// Process-wide holder for the grading model.
pub struct GradingModelSlot {
  config: GradingModelConfig,
  cell: OnceCell<Arc<dyn GradingModel>>,
}

impl GradingModelSlot {
  pub fn new(config: GradingModelConfig) -> Self {
    Self { config, cell: OnceCell::new() }
  }

  /// A slot whose model is already resident.
  #[cfg(test)]
  pub fn preloaded(config: GradingModelConfig, model: Arc<dyn GradingModel>) -> Self {
    Self { config, cell: OnceCell::new_with(Some(model)) }
  }

  pub fn config(&self) -> &GradingModelConfig {
    &self.config
  }

  pub fn adapter(&self) -> AdapterConfig {
    AdapterConfig { adapter_len: self.config.adapter_len, adapter_layer: self.config.adapter_layer }
  }

  /// The resident model, if any.
  pub fn get(&self) -> Option<Arc<dyn GradingModel>> {
    self.cell.get().cloned()
  }

  pub fn is_loaded(&self) -> bool {
    self.cell.initialized()
  }

  /// Load the model unless it is already resident. Concurrent callers wait for one load.
  #[instrument(level = "info", skip(self), fields(checkpoint = %self.config.checkpoint))]
  pub async fn load(&self) -> Result<LoadOutcome, AppError> {
    let fresh = AtomicBool::new(false);
    let result = self
      .cell
      .get_or_try_init(|| async {
        fresh.store(true, Ordering::Relaxed);
        ChatGradingModel::load(&self.config)
          .await
          .map(|m| Arc::new(m) as Arc<dyn GradingModel>)
      })
      .await;

    match result {
      Ok(model) if fresh.load(Ordering::Relaxed) => {
        info!(target: "quiz", model = %model.name(), "Grading model loaded");
        Ok(LoadOutcome::Loaded)
      }
      Ok(_) => Ok(LoadOutcome::AlreadyLoaded),
      Err(e) => {
        error!(target: "quiz", error = %e, "Grading model load failed");
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn cfg(base_url: &str, checkpoint: &str) -> GradingModelConfig {
    GradingModelConfig {
      base_url: base_url.into(),
      api_key: "k".into(),
      checkpoint: checkpoint.into(),
      adapter_len: 10,
      adapter_layer: 30,
      max_new_tokens: 100,
    }
  }

  async fn models_server(ids: &[&str], expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    let data: Vec<_> = ids.iter().map(|id| serde_json::json!({ "id": id })).collect();
    Mock::given(method("GET"))
      .and(path("/models"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data })))
      .expect(expected_calls)
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn loads_exactly_once() {
    let server = models_server(&["grader"], 1).await;
    let slot = GradingModelSlot::new(cfg(&server.uri(), "grader"));
    assert!(!slot.is_loaded());

    assert_eq!(slot.load().await.unwrap(), LoadOutcome::Loaded);
    assert_eq!(slot.load().await.unwrap(), LoadOutcome::AlreadyLoaded);
    assert!(slot.is_loaded());
    assert_eq!(slot.get().unwrap().name(), "grader");
    assert_eq!(slot.adapter(), AdapterConfig { adapter_len: 10, adapter_layer: 30 });
  }

  #[tokio::test]
  async fn unknown_checkpoint_fails_and_stays_unloaded() {
    let server = models_server(&["something-else"], 2).await;
    let slot = GradingModelSlot::new(cfg(&server.uri(), "grader"));

    let err = slot.load().await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService(_)));
    assert!(slot.get().is_none());
    // a failed load may be retried
    assert!(slot.load().await.is_err());
  }

  #[tokio::test]
  async fn generate_passes_token_budget() {
    let server = models_server(&["grader"], 1).await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(wiremock::matchers::body_partial_json(serde_json::json!({ "max_tokens": 42, "model": "grader" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": "Good start."}}]
      })))
      .mount(&server)
      .await;

    let model = ChatGradingModel::load(&cfg(&server.uri(), "grader")).await.unwrap();
    assert_eq!(model.generate("prompt", 42).await.unwrap(), "Good start.");
  }
}
