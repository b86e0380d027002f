//! Quiz session controller.
//!
//! `NotLoaded -> InProgress -> Completed`, with restart going back to
//! `InProgress` at index 0 and score 0 over the same questions.
//! Invariant: `0 <= current_index <= questions.len()`; index == len means Completed.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{GradingResult, QuestionRecord};
use crate::error::AppError;
use crate::grading::GradingStrategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
  NotLoaded,
  InProgress,
  Completed,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
  pub state: QuizState,
  pub current_index: usize,
  pub total: usize,
  pub score: f64,
  /// Only set once the quiz is completed.
  pub final_percentage: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct QuizSession {
  questions: Vec<QuestionRecord>,
  current_index: usize,
  score: f64,
}

impl QuizSession {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn state(&self) -> QuizState {
    if self.questions.is_empty() {
      QuizState::NotLoaded
    } else if self.current_index >= self.questions.len() {
      QuizState::Completed
    } else {
      QuizState::InProgress
    }
  }

  pub fn current_index(&self) -> usize {
    self.current_index
  }

  pub fn score(&self) -> f64 {
    self.score
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  /// Replace any previous quiz with `questions`, starting over.
  #[instrument(level = "info", skip_all, fields(rows = questions.len()))]
  pub fn load(&mut self, questions: Vec<QuestionRecord>) -> Result<QuizProgress, AppError> {
    if questions.is_empty() {
      return Err(AppError::validation("The question table has no rows."));
    }
    self.questions = questions;
    self.current_index = 0;
    self.score = 0.0;
    info!(target: "quiz", total = self.questions.len(), "Quiz loaded");
    Ok(self.progress())
  }

  pub fn current_question(&self) -> Option<&QuestionRecord> {
    self.questions.get(self.current_index)
  }

  /// Grade `answer` against the current question and move past it.
  #[instrument(level = "info", skip_all, fields(index = self.current_index, answer_len = answer.len()))]
  pub async fn submit(
    &mut self,
    answer: &str,
    strategy: &GradingStrategy,
    prompts: &Prompts,
  ) -> Result<(GradingResult, QuizProgress), AppError> {
    let record = match self.state() {
      QuizState::InProgress => self.questions[self.current_index].clone(),
      QuizState::NotLoaded => return Err(AppError::InvalidState("No quiz loaded. Upload a question table first.".into())),
      QuizState::Completed => return Err(AppError::InvalidState("The quiz is completed. Restart to try again.".into())),
    };
    if answer.trim().is_empty() {
      warn!(target: "quiz", index = self.current_index, "Empty answer rejected");
      return Err(AppError::validation("Please enter an answer before submitting."));
    }

    let result = strategy.grade(prompts, &record, answer).await;
    if let Some(s) = result.score {
      self.score += s;
    }
    self.current_index += 1;

    let progress = self.progress();
    info!(target: "quiz", index = progress.current_index, total = progress.total, score = progress.score, state = ?progress.state, "Answer graded");
    Ok((result, progress))
  }

  /// Back to the first question with a zero score; questions are kept.
  #[instrument(level = "info", skip_all)]
  pub fn restart(&mut self) -> Result<QuizProgress, AppError> {
    if self.questions.is_empty() {
      return Err(AppError::InvalidState("No quiz loaded. Upload a question table first.".into()));
    }
    self.current_index = 0;
    self.score = 0.0;
    info!(target: "quiz", total = self.questions.len(), "Quiz restarted");
    Ok(self.progress())
  }

  /// Score as a percentage of the number of questions, once completed.
  pub fn final_percentage(&self) -> Option<f64> {
    match self.state() {
      QuizState::Completed => Some(self.score / self.questions.len() as f64 * 100.0),
      _ => None,
    }
  }

  pub fn progress(&self) -> QuizProgress {
    QuizProgress {
      state: self.state(),
      current_index: self.current_index,
      total: self.len(),
      score: self.score(),
      final_percentage: self.final_percentage(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use crate::grading::tests::{model_cfg, StubModel};
  use crate::model::GradingModelSlot;

  fn rows(n: usize) -> Vec<QuestionRecord> {
    (0..n)
      .map(|i| QuestionRecord {
        question: format!("Q{i}"),
        suggested_answer: "cat".into(),
        guided_response: format!("G{i}"),
      })
      .collect()
  }

  #[test]
  fn starts_not_loaded() {
    let s = QuizSession::new();
    assert_eq!(s.state(), QuizState::NotLoaded);
    assert!(s.current_question().is_none());
  }

  #[test]
  fn loading_three_rows_starts_in_progress() {
    let mut s = QuizSession::new();
    let p = s.load(rows(3)).unwrap();
    assert_eq!(p.state, QuizState::InProgress);
    assert_eq!(p.current_index, 0);
    assert_eq!(p.score, 0.0);
    assert_eq!(p.total, 3);
    assert_eq!(s.current_question().unwrap().question, "Q0");
  }

  #[test]
  fn empty_table_is_rejected() {
    let mut s = QuizSession::new();
    assert!(matches!(s.load(vec![]), Err(AppError::Validation(_))));
    assert_eq!(s.state(), QuizState::NotLoaded);
  }

  #[tokio::test]
  async fn empty_answer_changes_nothing() {
    let mut s = QuizSession::new();
    s.load(rows(2)).unwrap();
    for blank in ["", "   \n\t"] {
      let err = s.submit(blank, &GradingStrategy::Similarity, &Prompts::default()).await.unwrap_err();
      assert!(matches!(err, AppError::Validation(_)));
    }
    assert_eq!(s.current_index(), 0);
    assert_eq!(s.score(), 0.0);
  }

  #[tokio::test]
  async fn last_answer_completes_the_quiz() {
    let mut s = QuizSession::new();
    s.load(rows(2)).unwrap();
    let (r, p) = s.submit("cat", &GradingStrategy::Similarity, &Prompts::default()).await.unwrap();
    assert_eq!(r.score, Some(1.0));
    assert_eq!(p.state, QuizState::InProgress);
    assert_eq!(p.current_index, 1);

    let (_, p) = s.submit("dog", &GradingStrategy::Similarity, &Prompts::default()).await.unwrap();
    assert_eq!(p.state, QuizState::Completed);
    assert_eq!(p.current_index, s.len());
    assert_eq!(p.score, 1.0);
    assert_eq!(p.final_percentage, Some(50.0));

    let err = s.submit("cat", &GradingStrategy::Similarity, &Prompts::default()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(s.current_index(), 2);
  }

  #[tokio::test]
  async fn restart_keeps_questions() {
    let mut s = QuizSession::new();
    s.load(rows(1)).unwrap();
    s.submit("cat", &GradingStrategy::Similarity, &Prompts::default()).await.unwrap();
    assert_eq!(s.state(), QuizState::Completed);

    let p = s.restart().unwrap();
    assert_eq!(p.state, QuizState::InProgress);
    assert_eq!(p.current_index, 0);
    assert_eq!(p.score, 0.0);
    assert_eq!(p.total, 1);
    assert_eq!(p.final_percentage, None);
  }

  #[test]
  fn restart_requires_a_loaded_quiz() {
    assert!(matches!(QuizSession::new().restart(), Err(AppError::InvalidState(_))));
  }

  #[tokio::test]
  async fn failing_model_still_advances_without_score() {
    let slot = GradingModelSlot::preloaded(model_cfg(), Arc::new(StubModel { reply: Err("boom".into()) }));
    let mut s = QuizSession::new();
    s.load(rows(1)).unwrap();

    let (r, p) = s.submit("cat", &GradingStrategy::select(&slot), &Prompts::default()).await.unwrap();
    assert!(r.feedback.contains("boom"));
    assert_eq!(p.state, QuizState::Completed);
    assert_eq!(p.score, 0.0);
  }

  #[tokio::test]
  async fn reload_resets_progress() {
    let mut s = QuizSession::new();
    s.load(rows(2)).unwrap();
    s.submit("cat", &GradingStrategy::Similarity, &Prompts::default()).await.unwrap();
    let p = s.load(rows(3)).unwrap();
    assert_eq!((p.current_index, p.score, p.total), (0, 0.0, 3));
  }
}
