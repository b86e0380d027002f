//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, Level};

use crate::analytics::inject_bootstrap;
use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from the static dir; `index.html` is served with the analytics tag injected
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let spa_fallback = get(spa_index).with_state(state.clone());
    let static_service = ServeDir::new(&state.static_dir)
        .append_index_html_on_directories(false)
        .fallback(spa_fallback);

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/session", post(http::http_create_session))
        .route("/api/v1/session/:id", get(http::http_get_session).delete(http::http_delete_session))
        .route("/api/v1/session/:id/lesson", post(http::http_post_lesson))
        .route("/api/v1/session/:id/quiz", get(http::http_get_quiz).post(http::http_post_quiz))
        .route("/api/v1/session/:id/quiz/answer", post(http::http_post_answer))
        .route("/api/v1/session/:id/quiz/restart", post(http::http_post_restart))
        .route("/api/v1/grading-model", get(http::http_get_grading_model))
        .route("/api/v1/grading-model/load", post(http::http_post_load_grading_model))
        .route("/", get(spa_index))
        .route("/index.html", get(spa_index))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

/// The SPA entry page, tagged for analytics when a measurement id is configured.
async fn spa_index(State(state): State<Arc<AppState>>) -> Response {
    let path = std::path::Path::new(&state.static_dir).join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => match &state.ga_measurement_id {
            Some(id) => Html(inject_bootstrap(&page, id)).into_response(),
            None => Html(page).into_response(),
        },
        Err(e) => {
            error!(target: "situate_backend", path = %path.display(), error = %e, "index.html not readable");
            (StatusCode::NOT_FOUND, "index.html not found").into_response()
        }
    }
}
