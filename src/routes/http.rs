//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::protocol::*;
use crate::state::AppState;
use crate::logic::*;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let session_id = state.create_session().await;
  (StatusCode::CREATED, Json(SessionCreatedOut { session_id }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, AppError> {
  let handle = state.session(id).await?;
  let session = handle.lock().await;
  Ok(Json(session_out(&session)))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
  state.end_session(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(%id, lesson_len = body.lesson.len()))]
pub async fn http_post_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<LessonIn>,
) -> Result<Json<LessonOut>, AppError> {
  let handle = state.session(id).await?;
  let mut session = handle.lock().await;
  let out = do_generate_lesson(&state, &mut session, &body.lesson, body.locale.as_deref()).await?;
  info!(target: "lesson", session_id = %id, response_len = out.questions.len(), "HTTP questions served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, csv_text), fields(%id, bytes = csv_text.len()))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  csv_text: String,
) -> Result<Json<QuizOut>, AppError> {
  let handle = state.session(id).await?;
  let mut session = handle.lock().await;
  let out = do_upload_quiz(&mut session, &csv_text)?;
  info!(target: "quiz", session_id = %id, total = out.progress.total, "HTTP quiz uploaded");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<QuizOut>, AppError> {
  let handle = state.session(id).await?;
  let session = handle.lock().await;
  Ok(Json(quiz_out(&session)))
}

#[instrument(level = "info", skip(state, body), fields(%id, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, AppError> {
  let handle = state.session(id).await?;
  let mut session = handle.lock().await;
  let out = do_submit_answer(&state, &mut session, &body.answer).await?;
  info!(target: "quiz", session_id = %id, graded_by = ?out.graded_by, score = ?out.score, "HTTP answer evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<QuizOut>, AppError> {
  let handle = state.session(id).await?;
  let mut session = handle.lock().await;
  Ok(Json(do_restart_quiz(&mut session)?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_grading_model(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(grading_model_status(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_load_grading_model(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(do_load_grading_model(&state).await)
}
