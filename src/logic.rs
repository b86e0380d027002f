//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Generating lesson questions (with analytics + share payloads)
//!   - Uploading a question table, submitting answers, restarting the quiz
//!   - Loading the grading model on request

use tracing::{info, instrument, warn};

use crate::domain::AnalyticsEvent;
use crate::error::AppError;
use crate::grading::GradingStrategy;
use crate::lesson::generate_questions;
use crate::model::LoadOutcome;
use crate::protocol::{AnswerOut, GradingModelOut, LessonOut, QuestionOut, QuizOut, SessionOut};
use crate::share::{clipboard_script, share_links};
use crate::state::{AppState, UserSession};
use crate::table::load_questions;

pub fn session_out(session: &UserSession) -> SessionOut {
  SessionOut {
    session_id: session.id,
    teacher_input: session.teacher_input.clone(),
    ai_response: session.ai_response.clone(),
    quiz: session.quiz.progress(),
  }
}

pub fn quiz_out(session: &UserSession) -> QuizOut {
  QuizOut {
    progress: session.quiz.progress(),
    current: session.quiz.current_question().map(|q| QuestionOut {
      index: session.quiz.current_index(),
      question: q.question.clone(),
    }),
  }
}

#[instrument(level = "info", skip(state, session, lesson), fields(session_id = %session.id, lesson_len = lesson.len()))]
pub async fn do_generate_lesson(
  state: &AppState,
  session: &mut UserSession,
  lesson: &str,
  locale: Option<&str>,
) -> Result<LessonOut, AppError> {
  session.teacher_input = lesson.to_string();
  if lesson.trim().is_empty() {
    warn!(target: "lesson", session_id = %session.id, "Empty lesson rejected");
    return Err(AppError::validation("Please provide a topic or lesson before submitting."));
  }

  let analytics_script = state.analytics.emit(&AnalyticsEvent::teacher_input(lesson));
  let questions = generate_questions(&state.chat, &state.prompts, lesson, locale).await?;
  session.ai_response = questions.clone();

  Ok(LessonOut {
    share: share_links(&questions),
    clipboard_script: clipboard_script(&questions),
    questions,
    analytics_script,
    feedback_url: state.feedback_url.clone(),
  })
}

/// Parse and install a new quiz. A failed upload leaves the current quiz untouched.
#[instrument(level = "info", skip(session, csv_text), fields(session_id = %session.id, bytes = csv_text.len()))]
pub fn do_upload_quiz(session: &mut UserSession, csv_text: &str) -> Result<QuizOut, AppError> {
  let records = load_questions(csv_text)?;
  session.quiz.load(records)?;
  Ok(quiz_out(session))
}

#[instrument(level = "info", skip(state, session, answer), fields(session_id = %session.id, answer_len = answer.len()))]
pub async fn do_submit_answer(
  state: &AppState,
  session: &mut UserSession,
  answer: &str,
) -> Result<AnswerOut, AppError> {
  let strategy = GradingStrategy::select(&state.grading_model);
  let (result, _) = session.quiz.submit(answer, &strategy, &state.prompts).await?;
  Ok(AnswerOut {
    feedback: result.feedback,
    score: result.score,
    graded_by: result.graded_by,
    quiz: quiz_out(session),
  })
}

#[instrument(level = "info", skip(session), fields(session_id = %session.id))]
pub fn do_restart_quiz(session: &mut UserSession) -> Result<QuizOut, AppError> {
  session.quiz.restart()?;
  Ok(quiz_out(session))
}

pub fn grading_model_status(state: &AppState) -> GradingModelOut {
  let loaded = state.grading_model.is_loaded();
  GradingModelOut {
    loaded,
    checkpoint: state.grading_model.config().checkpoint.clone(),
    adapter: state.grading_model.adapter(),
    message: if loaded { "Grading model is loaded.".into() } else { "Grading model is not loaded; similarity grading is used.".into() },
  }
}

/// Blocking, explicit load of the grading model. Failure is reported, not raised.
#[instrument(level = "info", skip(state))]
pub async fn do_load_grading_model(state: &AppState) -> GradingModelOut {
  let checkpoint = state.grading_model.config().checkpoint.clone();
  let adapter = state.grading_model.adapter();
  match state.grading_model.load().await {
    Ok(LoadOutcome::Loaded) => {
      info!(target: "quiz", %checkpoint, "Grading model ready");
      GradingModelOut { loaded: true, checkpoint, adapter, message: "Grading model loaded successfully.".into() }
    }
    Ok(LoadOutcome::AlreadyLoaded) => {
      GradingModelOut { loaded: true, checkpoint, adapter, message: "Grading model is already loaded.".into() }
    }
    Err(e) => GradingModelOut {
      loaded: false,
      checkpoint,
      adapter,
      message: format!("Error loading model: {}", e),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::session::QuizState;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn state_for(server: &MockServer, extra: &[(&str, &str)]) -> AppState {
    let uri = server.uri();
    let mut vars = vec![("GROQ_API_KEY".to_string(), "k".to_string()), ("GROQ_BASE_URL".to_string(), uri)];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    let cfg = AppConfig::from_lookup(move |k| vars.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone())).unwrap();
    AppState::new(cfg).unwrap()
  }

  #[tokio::test]
  async fn lesson_flow_stores_input_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": "1. How does light become sugar?"}}]
      })))
      .mount(&server)
      .await;
    let state = state_for(&server, &[("GA_MEASUREMENT_ID", "G-1"), ("FEEDBACK_URL", "https://example.org/f")]);
    let mut session = UserSession::new();

    let out = do_generate_lesson(&state, &mut session, "photosynthesis", None).await.unwrap();
    assert_eq!(out.questions, "1. How does light become sugar?");
    assert_eq!(session.ai_response, out.questions);
    assert_eq!(session.teacher_input, "photosynthesis");
    assert!(out.analytics_script.unwrap().contains("'value': 'photosynthesis'"));
    assert_eq!(out.feedback_url.as_deref(), Some("https://example.org/f"));
    assert!(out.share.whatsapp.contains("How%20does%20light"));
  }

  #[tokio::test]
  async fn empty_lesson_keeps_previous_response() {
    let server = MockServer::start().await;
    let state = state_for(&server, &[]);
    let mut session = UserSession::new();
    session.ai_response = "earlier".into();

    let err = do_generate_lesson(&state, &mut session, "   ", None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(session.ai_response, "earlier");
  }

  #[tokio::test]
  async fn quiz_flow_with_similarity_grading() {
    let server = MockServer::start().await;
    let state = state_for(&server, &[]);
    let mut session = UserSession::new();

    let quiz = do_upload_quiz(&mut session, "question,suggested_answer,guided_response\nQ,cat,G\n").unwrap();
    assert_eq!(quiz.progress.state, QuizState::InProgress);
    assert_eq!(quiz.current.as_ref().unwrap().question, "Q");

    let out = do_submit_answer(&state, &mut session, "cat").await.unwrap();
    assert_eq!(out.score, Some(1.0));
    assert!(out.feedback.contains("100.00%"));
    assert_eq!(out.quiz.progress.state, QuizState::Completed);
    assert_eq!(out.quiz.progress.final_percentage, Some(100.0));
    assert!(out.quiz.current.is_none());

    let quiz = do_restart_quiz(&mut session).unwrap();
    assert_eq!(quiz.progress.current_index, 0);
    assert_eq!(quiz.progress.score, 0.0);
  }

  #[tokio::test]
  async fn bad_upload_keeps_existing_quiz() {
    let mut session = UserSession::new();
    do_upload_quiz(&mut session, "question,suggested_answer,guided_response\nQ,A,G\n").unwrap();
    let err = do_upload_quiz(&mut session, "question\nQ\n").unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(session.quiz.len(), 1);
  }

  #[tokio::test]
  async fn grading_model_load_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/models"))
      .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({ "error": { "message": "Invalid API Key" } })))
      .mount(&server)
      .await;
    let state = state_for(&server, &[]);

    let out = do_load_grading_model(&state).await;
    assert!(!out.loaded);
    assert!(out.message.contains("Invalid API Key"));
    let status = grading_model_status(&state);
    assert!(!status.loaded);
    assert_eq!(status.adapter.adapter_len, state.grading_model.config().adapter_len);
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["adapter"]["adapterLayer"], 30);
  }
}
