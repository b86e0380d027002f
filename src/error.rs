//! Error taxonomy shared by the core modules and the transport layer.
//!
//! - `Validation`: malformed or missing user input (table columns, empty answer,
//!   empty lesson). Reported to the user, no state is mutated.
//! - `ExternalService`: a remote collaborator failed (chat API, grading model).
//!   Contained where the call is made and turned into degraded feedback.
//! - `Configuration`: missing secret or unreadable config. Fails fast at startup.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  Validation(String),

  #[error("external service error: {0}")]
  ExternalService(String),

  #[error("configuration error: {0}")]
  Configuration(String),

  /// The quiz is not in a state that accepts the requested action.
  #[error("{0}")]
  InvalidState(String),

  #[error("unknown session: {0}")]
  SessionNotFound(Uuid),
}

impl AppError {
  pub fn validation(msg: impl Into<String>) -> Self {
    AppError::Validation(msg.into())
  }

  pub fn external(msg: impl Into<String>) -> Self {
    AppError::ExternalService(msg.into())
  }

  /// Stable snake_case tag used in JSON error bodies and WS error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation",
      AppError::ExternalService(_) => "external_service",
      AppError::Configuration(_) => "configuration",
      AppError::InvalidState(_) => "invalid_state",
      AppError::SessionNotFound(_) => "session_not_found",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
      AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::InvalidState(_) => StatusCode::CONFLICT,
      AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
    }
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: String,
  kind: &'static str,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = ErrorBody { error: self.to_string(), kind: self.kind() };
    (self.status(), Json(body)).into_response()
  }
}
