//! Grading strategy selection.
//!
//! Per submission we pick one of two strategies: model feedback when a grading
//! model is resident, otherwise the deterministic similarity ratio. Model
//! failures never escape; they become an error notice and the quiz moves on.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{GradedBy, GradingResult, QuestionRecord};
use crate::model::{GradingModel, GradingModelSlot};
use crate::similarity::similarity_ratio;
use crate::util::fill_template;

pub enum GradingStrategy {
  Model { model: Arc<dyn GradingModel>, max_new_tokens: u32 },
  Similarity,
}

impl GradingStrategy {
  /// Decide once, from capability availability.
  pub fn select(slot: &GradingModelSlot) -> Self {
    match slot.get() {
      Some(model) => GradingStrategy::Model { model, max_new_tokens: slot.config().max_new_tokens },
      None => GradingStrategy::Similarity,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      GradingStrategy::Model { .. } => "model",
      GradingStrategy::Similarity => "similarity",
    }
  }

  #[instrument(level = "info", skip_all, fields(strategy = self.label(), answer_len = answer.len()))]
  pub async fn grade(&self, prompts: &Prompts, record: &QuestionRecord, answer: &str) -> GradingResult {
    match self {
      GradingStrategy::Model { model, max_new_tokens } => {
        let prompt = grading_prompt(prompts, record, answer);
        match model.generate(&prompt, *max_new_tokens).await {
          Ok(text) => {
            info!(target: "quiz", model = %model.name(), feedback_len = text.len(), "Model feedback generated");
            GradingResult { feedback: text, score: None, graded_by: GradedBy::Model }
          }
          Err(e) => {
            error!(target: "quiz", model = %model.name(), error = %e, "Model grading failed; answer left ungraded");
            GradingResult {
              feedback: format!("An error occurred during evaluation: {}", e),
              score: None,
              graded_by: GradedBy::Error,
            }
          }
        }
      }
      GradingStrategy::Similarity => similarity_feedback(record, answer),
    }
  }
}

pub fn grading_prompt(prompts: &Prompts, record: &QuestionRecord, answer: &str) -> String {
  fill_template(
    &prompts.grading_template,
    &[
      ("question", &record.question),
      ("suggested_answer", &record.suggested_answer),
      ("student_answer", answer),
    ],
  )
}

fn similarity_feedback(record: &QuestionRecord, answer: &str) -> GradingResult {
  let score = similarity_ratio(answer, &record.suggested_answer);
  let feedback = format!(
    "Similarity Score: {:.2}%\nSuggested Answer: {}\nGuided Response: {}",
    score * 100.0,
    record.suggested_answer,
    record.guided_response
  );
  GradingResult { feedback, score: Some(score), graded_by: GradedBy::Similarity }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::config::GradingModelConfig;
  use crate::error::AppError;
  use async_trait::async_trait;

  pub(crate) struct StubModel {
    pub reply: Result<String, String>,
  }

  #[async_trait]
  impl GradingModel for StubModel {
    fn name(&self) -> &str {
      "stub"
    }

    async fn generate(&self, prompt: &str, _max_new_tokens: u32) -> Result<String, AppError> {
      assert!(prompt.contains("Student Answer:"));
      self.reply.clone().map_err(AppError::external)
    }
  }

  pub(crate) fn model_cfg() -> GradingModelConfig {
    GradingModelConfig {
      base_url: "http://127.0.0.1:9".into(),
      api_key: "k".into(),
      checkpoint: "stub".into(),
      adapter_len: 10,
      adapter_layer: 30,
      max_new_tokens: 100,
    }
  }

  fn record() -> QuestionRecord {
    QuestionRecord { question: "Q".into(), suggested_answer: "cat".into(), guided_response: "G".into() }
  }

  #[tokio::test]
  async fn similarity_exact_match() {
    let slot = GradingModelSlot::new(model_cfg());
    let strategy = GradingStrategy::select(&slot);
    assert_eq!(strategy.label(), "similarity");

    let r = strategy.grade(&Prompts::default(), &record(), "cat").await;
    assert_eq!(r.score, Some(1.0));
    assert_eq!(r.graded_by, GradedBy::Similarity);
    assert!(r.feedback.contains("100.00%"));
    assert!(r.feedback.contains("Suggested Answer: cat"));
    assert!(r.feedback.contains("Guided Response: G"));
  }

  #[tokio::test]
  async fn similarity_no_overlap() {
    let r = GradingStrategy::Similarity.grade(&Prompts::default(), &record(), "dog").await;
    assert_eq!(r.score, Some(0.0));
    assert!(r.feedback.contains("0.00%"));
  }

  #[tokio::test]
  async fn resident_model_takes_priority() {
    let model = Arc::new(StubModel { reply: Ok("Nice reasoning.".into()) });
    let slot = GradingModelSlot::preloaded(model_cfg(), model);
    let strategy = GradingStrategy::select(&slot);
    assert_eq!(strategy.label(), "model");

    let r = strategy.grade(&Prompts::default(), &record(), "a feline").await;
    assert_eq!(r.feedback, "Nice reasoning.");
    assert_eq!(r.score, None);
    assert_eq!(r.graded_by, GradedBy::Model);
  }

  #[tokio::test]
  async fn model_failure_becomes_error_notice() {
    let model = Arc::new(StubModel { reply: Err("CUDA out of memory".into()) });
    let slot = GradingModelSlot::preloaded(model_cfg(), model);
    let r = GradingStrategy::select(&slot).grade(&Prompts::default(), &record(), "cat").await;
    assert_eq!(r.graded_by, GradedBy::Error);
    assert_eq!(r.score, None);
    assert!(r.feedback.contains("CUDA out of memory"));
  }

  #[test]
  fn prompt_embeds_all_three_texts() {
    let p = grading_prompt(&Prompts::default(), &record(), "kitty");
    assert!(p.contains("Question: Q"));
    assert!(p.contains("Suggested Answer: cat"));
    assert!(p.contains("Student Answer: kitty"));
  }
}
