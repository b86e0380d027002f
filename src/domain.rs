//! Domain models: quiz rows, grading outcomes and analytics events.

use serde::{Deserialize, Serialize};

/// One quiz item as loaded from the question table. Identity is its row position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
  pub question: String,
  pub suggested_answer: String,
  /// Hint or scaffolding shown to students who need support.
  pub guided_response: String,
}

/// Which strategy produced a grading result?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradedBy {
  Model,
  Similarity,
  /// The model path failed; feedback is an error notice.
  Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct GradingResult {
  pub feedback: String,
  /// Similarity in [0, 1]; absent for model feedback and error notices.
  pub score: Option<f64>,
  pub graded_by: GradedBy,
}

/// Fire-and-forget analytics event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyticsEvent {
  pub name: String,
  pub category: String,
  pub label: String,
  pub value: String,
}

impl AnalyticsEvent {
  /// The event emitted whenever a teacher submits a lesson topic.
  pub fn teacher_input(lesson: &str) -> Self {
    Self {
      name: "user_input".into(),
      category: "User Interaction".into(),
      label: "Teacher Input".into(),
      value: lesson.to_string(),
    }
  }
}
