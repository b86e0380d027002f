//! Application state: config, chat client, grading model slot, analytics sink and user sessions.
//!
//! User sessions replace page-level globals: each one carries its own teacher
//! input, last generated questions and quiz. HTTP sessions live in a bounded
//! cache: a session ends when it sits idle past `SESSION_IDLE_SECS`, when the
//! least recently used one is evicted at `MAX_SESSIONS`, or when it is deleted.
//! A WebSocket connection owns its session outright.

use std::{sync::Arc, time::Duration};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::analytics::{AnalyticsSink, GtagSink, NoopSink};
use crate::config::{AppConfig, Prompts, SessionConfig};
use crate::error::AppError;
use crate::model::GradingModelSlot;
use crate::openai::ChatClient;
use crate::session::QuizSession;

#[derive(Debug)]
pub struct UserSession {
    pub id: Uuid,
    pub teacher_input: String,
    pub ai_response: String,
    pub quiz: QuizSession,
}

impl UserSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            teacher_input: String::new(),
            ai_response: String::new(),
            quiz: QuizSession::new(),
        }
    }
}

pub type SessionHandle = Arc<Mutex<UserSession>>;

pub struct AppState {
    pub chat: ChatClient,
    pub prompts: Prompts,
    pub grading_model: GradingModelSlot,
    pub analytics: Box<dyn AnalyticsSink>,
    pub feedback_url: Option<String>,
    pub ga_measurement_id: Option<String>,
    pub static_dir: String,
    sessions: Cache<Uuid, SessionHandle>,
}

fn session_store(cfg: SessionConfig) -> Cache<Uuid, SessionHandle> {
    Cache::builder()
        .max_capacity(cfg.max_sessions)
        .time_to_idle(Duration::from_secs(cfg.idle_secs))
        // new sessions must always be admitted, so plain LRU rather than TinyLFU
        .eviction_policy(EvictionPolicy::lru())
        .build()
}

impl AppState {
    /// Build state from a validated config.
    #[instrument(level = "info", skip_all)]
    pub fn new(cfg: AppConfig) -> Result<Self, AppError> {
        let chat = ChatClient::new(&cfg.chat.api_key, &cfg.chat.base_url, &cfg.chat.model)
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        info!(target: "situate_backend", base_url = %chat.base_url, model = %chat.model, "Chat client ready.");

        let analytics: Box<dyn AnalyticsSink> = match &cfg.ga_measurement_id {
            Some(id) => {
                info!(target: "situate_backend", measurement_id = %id, "Analytics enabled (gtag).");
                Box::new(GtagSink { measurement_id: id.clone() })
            }
            None => {
                info!(target: "situate_backend", "Analytics disabled (no GA_MEASUREMENT_ID).");
                Box::new(NoopSink)
            }
        };

        info!(
            target: "situate_backend",
            checkpoint = %cfg.grading_model.checkpoint,
            adapter_len = cfg.grading_model.adapter_len,
            adapter_layer = cfg.grading_model.adapter_layer,
            "Grading model configured (not loaded)."
        );

        info!(
            target: "situate_backend",
            max_sessions = cfg.sessions.max_sessions,
            idle_secs = cfg.sessions.idle_secs,
            "Session store bounded."
        );

        Ok(Self {
            chat,
            prompts: cfg.prompts,
            grading_model: GradingModelSlot::new(cfg.grading_model),
            analytics,
            feedback_url: cfg.feedback_url,
            ga_measurement_id: cfg.ga_measurement_id,
            static_dir: cfg.static_dir,
            sessions: session_store(cfg.sessions),
        })
    }

    /// Create and register a fresh user session.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> Uuid {
        let session = UserSession::new();
        let id = session.id;
        self.sessions.insert(id, Arc::new(Mutex::new(session))).await;
        info!(target: "situate_backend", session_id = %id, active_sessions = self.session_count(), "Session created");
        id
    }

    /// Look up a live session; reading it resets its idle timer.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn session(&self, id: Uuid) -> Result<SessionHandle, AppError> {
        self.sessions.get(&id).await.ok_or(AppError::SessionNotFound(id))
    }

    /// End a session explicitly.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn end_session(&self, id: Uuid) -> Result<(), AppError> {
        self.sessions.remove(&id).await.ok_or(AppError::SessionNotFound(id))?;
        info!(target: "situate_backend", session_id = %id, active_sessions = self.session_count(), "Session ended");
        Ok(())
    }

    /// Approximate number of live sessions; evictions land on the cache's housekeeping runs.
    pub fn session_count(&self) -> u64 {
        self.sessions.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AppConfig {
        AppConfig::from_lookup(|k| (k == "GROQ_API_KEY").then(|| "k".to_string())).unwrap()
    }

    fn bounded(max_sessions: &'static str) -> AppState {
        let cfg = AppConfig::from_lookup(move |k| match k {
            "GROQ_API_KEY" => Some("k".to_string()),
            "MAX_SESSIONS" => Some(max_sessions.to_string()),
            _ => None,
        })
        .unwrap();
        AppState::new(cfg).unwrap()
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let state = AppState::new(cfg()).unwrap();
        let a = state.create_session().await;
        let b = state.create_session().await;
        assert_ne!(a, b);
        state.sessions.run_pending_tasks().await;
        assert_eq!(state.session_count(), 2);

        state.session(a).await.unwrap().lock().await.teacher_input = "fractions".into();
        assert!(state.session(b).await.unwrap().lock().await.teacher_input.is_empty());
    }

    #[tokio::test]
    async fn session_store_is_bounded() {
        let state = bounded("100");
        let mut last = Uuid::nil();
        for _ in 0..10_000 {
            last = state.create_session().await;
        }
        state.sessions.run_pending_tasks().await;
        assert!(state.session_count() <= 100, "{} sessions kept", state.session_count());
        // the newest session survives eviction
        assert!(state.session(last).await.is_ok());
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let store = session_store(SessionConfig { max_sessions: 10, idle_secs: 1 });
        let id = Uuid::new_v4();
        store.insert(id, Arc::new(Mutex::new(UserSession::new()))).await;
        assert!(store.get(&id).await.is_some());
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn ended_session_is_gone() {
        let state = AppState::new(cfg()).unwrap();
        let id = state.create_session().await;
        state.end_session(id).await.unwrap();
        assert!(matches!(state.session(id).await, Err(AppError::SessionNotFound(_))));
        assert!(matches!(state.end_session(id).await, Err(AppError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = AppState::new(cfg()).unwrap();
        let err = state.session(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }
}
