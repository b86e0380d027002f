//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::GradedBy;
use crate::model::AdapterConfig;
use crate::session::QuizProgress;
use crate::share::ShareLinks;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GenerateQuestions {
        lesson: String,
        #[serde(default)]
        locale: Option<String>,
    },
    UploadQuiz {
        csv: String,
    },
    SubmitAnswer {
        answer: String,
    },
    RestartQuiz,
    QuizStatus,
    LoadGradingModel,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    /// First message on every connection.
    Session {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Questions(LessonOut),
    Quiz(QuizOut),
    AnswerResult(AnswerOut),
    GradingModel(GradingModelOut),
    /// Non-fatal rejection (empty input, wrong quiz state, ...).
    Warning {
        kind: &'static str,
        message: String,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs (shared with WS payloads)
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct SessionCreatedOut {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: Uuid,
    pub teacher_input: String,
    pub ai_response: String,
    pub quiz: QuizProgress,
}

#[derive(Debug, Deserialize)]
pub struct LessonIn {
    pub lesson: String,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
    pub questions: String,
    pub share: ShareLinks,
    pub clipboard_script: String,
    /// gtag event snippet for the page to embed, when analytics is on.
    pub analytics_script: Option<String>,
    pub feedback_url: Option<String>,
}

/// The question currently shown to the student.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub index: usize,
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub progress: QuizProgress,
    pub current: Option<QuestionOut>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub feedback: String,
    pub score: Option<f64>,
    pub graded_by: GradedBy,
    pub quiz: QuizOut,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingModelOut {
    pub loaded: bool,
    pub checkpoint: String,
    pub adapter: AdapterConfig,
    pub message: String,
}
