//! Situate Learning · Teaching Assistant Backend
//!
//! - Axum HTTP + WebSocket API
//! - Lesson question generation through an OpenAI-compatible chat API (Groq by default)
//! - CSV quiz upload with similarity grading, or model grading once a grading model is loaded
//! - Static SPA fallback (STATIC_DIR/index.html) with optional gtag analytics
//!
//! Important env variables:
//!   PORT               : u16 (default 3000); malformed values stop startup
//!   GROQ_API_KEY       : required; startup fails without it
//!   GROQ_BASE_URL      : default "https://api.groq.com/openai/v1"
//!   GROQ_MODEL         : default "llama-3.1-8b-instant"
//!   GRADING_MODEL_*    : grading checkpoint, adapter config and token budget (see config.rs)
//!   GA_MEASUREMENT_ID  : enables analytics events + tag injection
//!   PROMPTS_CONFIG_PATH: path to TOML prompt overrides
//!   MAX_SESSIONS / SESSION_IDLE_SECS: user session store bounds
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod analytics;
mod config;
mod domain;
mod error;
mod grading;
mod lesson;
mod logic;
mod model;
mod openai;
mod protocol;
mod routes;
mod session;
mod share;
mod similarity;
mod state;
mod table;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Missing credentials or a broken prompt file stop us before we bind.
  let cfg = AppConfig::from_env().map_err(|e| {
    error!(target: "situate_backend", error = %e, "Invalid configuration");
    e
  })?;

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));

  // Build shared application state (chat client, grading model slot, sessions).
  let state = Arc::new(AppState::new(cfg)?);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  let listener = TcpListener::bind(addr).await?;
  info!(target: "situate_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "situate_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "situate_backend", error = %e, "Failed to listen for shutdown signal");
  }
}
