//! WebSocket upgrade + message loop. Each connection owns one user session;
//! client messages are parsed as JSON and forwarded to core logic, one reply each.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::AppError;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::{AppState, UserSession};

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "situate_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let mut session = UserSession::new();
  info!(target: "situate_backend", session_id = %session.id, "WebSocket connected");

  let hello = ServerWsMessage::Session { session_id: session.id };
  if send_json(&mut socket, &hello).await.is_err() {
    return;
  }

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "situate_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        if send_json(&mut socket, &reply_msg).await.is_err() {
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "situate_backend", session_id = %session.id, "WebSocket disconnected");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "situate_backend", error = %e, "WS send error");
    e
  })
}

fn rejection(e: AppError) -> ServerWsMessage {
  ServerWsMessage::Warning { kind: e.kind(), message: e.to_string() }
}

#[instrument(level = "info", skip(state, session), fields(session_id = %session.id))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &mut UserSession) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GenerateQuestions { lesson, locale } => {
      match do_generate_lesson(state, session, &lesson, locale.as_deref()).await {
        Ok(out) => ServerWsMessage::Questions(out),
        Err(e) => rejection(e),
      }
    }

    ClientWsMessage::UploadQuiz { csv } => match do_upload_quiz(session, &csv) {
      Ok(out) => ServerWsMessage::Quiz(out),
      Err(e) => rejection(e),
    },

    ClientWsMessage::SubmitAnswer { answer } => match do_submit_answer(state, session, &answer).await {
      Ok(out) => {
        info!(target: "quiz", graded_by = ?out.graded_by, "WS submit_answer evaluated");
        ServerWsMessage::AnswerResult(out)
      }
      Err(e) => rejection(e),
    },

    ClientWsMessage::RestartQuiz => match do_restart_quiz(session) {
      Ok(out) => ServerWsMessage::Quiz(out),
      Err(e) => rejection(e),
    },

    ClientWsMessage::QuizStatus => ServerWsMessage::Quiz(quiz_out(session)),

    ClientWsMessage::LoadGradingModel => ServerWsMessage::GradingModel(do_load_grading_model(state).await),
  }
}
