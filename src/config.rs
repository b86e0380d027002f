//! Runtime configuration: environment variables plus optional TOML prompt overrides.
//!
//! Env variables:
//!   GROQ_API_KEY                 : required, chat-completion credential
//!   GROQ_BASE_URL                : default "https://api.groq.com/openai/v1"
//!   GROQ_MODEL                   : default "llama-3.1-8b-instant"
//!   GRADING_MODEL_BASE_URL       : default GROQ_BASE_URL
//!   GRADING_MODEL_CHECKPOINT     : default "llama-adapter-grader"
//!   GRADING_MODEL_ADAPTER_LEN    : default 10
//!   GRADING_MODEL_ADAPTER_LAYER  : default 30
//!   GRADING_MODEL_MAX_NEW_TOKENS : default 100
//!   GA_MEASUREMENT_ID            : enables gtag analytics when present
//!   FEEDBACK_URL                 : link shown next to generated questions
//!   STATIC_DIR                   : SPA directory, default "./static"
//!   PROMPTS_CONFIG_PATH          : TOML file with a `[prompts]` table
//!   PORT                         : listen port, default 3000
//!   MAX_SESSIONS                 : user sessions kept at once, default 10000
//!   SESSION_IDLE_SECS            : idle time before a session ends, default 1800

use std::str::FromStr;

use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub chat: ChatConfig,
  pub grading_model: GradingModelConfig,
  pub ga_measurement_id: Option<String>,
  pub feedback_url: Option<String>,
  pub static_dir: String,
  pub prompts: Prompts,
  pub port: u16,
  pub sessions: SessionConfig,
}

/// Bounds on the HTTP user session store.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
  pub max_sessions: u64,
  pub idle_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// Where the generative grader lives and how it was adapted.
#[derive(Clone, Debug)]
pub struct GradingModelConfig {
  pub base_url: String,
  pub api_key: String,
  pub checkpoint: String,
  pub adapter_len: u32,
  pub adapter_layer: u32,
  pub max_new_tokens: u32,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsFile {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompts for the lesson generator and the model grader.
/// Placeholders: `{lesson}`, `{locale}`, `{question}`, `{suggested_answer}`, `{student_answer}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub lesson_system: String,
  pub lesson_user_template: String,
  /// Appended to the lesson prompt when a locale hint is supplied.
  pub lesson_locale_template: String,
  pub grading_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      lesson_system: "You are an enthusiastic, curious teacher assistant creating thought-provoking questions.".into(),
      lesson_user_template: "Teacher: {lesson} Can you create some engaging, higher-order thinking questions related to this topic? Include interdisciplinary questions.".into(),
      lesson_locale_template: " Where it helps, situate the questions in a {locale} context.".into(),
      grading_template: "Question: {question}\nSuggested Answer: {suggested_answer}\nStudent Answer: {student_answer}\nProvide feedback on the student's answer:".into(),
    }
  }
}

impl AppConfig {
  /// Read the whole configuration from the environment. Missing credentials fail fast.
  pub fn from_env() -> Result<Self, AppError> {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  /// Same as `from_env` with an injectable variable source.
  pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
    let api_key = get("GROQ_API_KEY")
      .filter(|k| !k.trim().is_empty())
      .ok_or_else(|| AppError::Configuration("GROQ_API_KEY is not set".into()))?;
    let base_url = get("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
    let model = get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());

    let grading_model = GradingModelConfig {
      base_url: get("GRADING_MODEL_BASE_URL").unwrap_or_else(|| base_url.clone()),
      api_key: api_key.clone(),
      checkpoint: get("GRADING_MODEL_CHECKPOINT").unwrap_or_else(|| "llama-adapter-grader".into()),
      adapter_len: parse_num(&get, "GRADING_MODEL_ADAPTER_LEN", 10)?,
      adapter_layer: parse_num(&get, "GRADING_MODEL_ADAPTER_LAYER", 30)?,
      max_new_tokens: parse_num(&get, "GRADING_MODEL_MAX_NEW_TOKENS", 100)?,
    };

    let prompts = match get("PROMPTS_CONFIG_PATH") {
      Some(path) => load_prompts(&path)?,
      None => Prompts::default(),
    };

    Ok(Self {
      chat: ChatConfig { api_key, base_url, model },
      grading_model,
      ga_measurement_id: get("GA_MEASUREMENT_ID").filter(|s| !s.trim().is_empty()),
      feedback_url: get("FEEDBACK_URL").filter(|s| !s.trim().is_empty()),
      static_dir: get("STATIC_DIR").unwrap_or_else(|| "./static".into()),
      prompts,
      port: parse_num(&get, "PORT", 3000)?,
      sessions: SessionConfig {
        max_sessions: parse_num(&get, "MAX_SESSIONS", 10_000)?,
        idle_secs: parse_num(&get, "SESSION_IDLE_SECS", 1800)?,
      },
    })
  }
}

fn parse_num<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
  T::Err: std::fmt::Display,
{
  match get(key) {
    None => Ok(default),
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Configuration(format!("{} must be a non-negative integer: {}", key, e))),
  }
}

/// Load prompt overrides. An explicitly configured but unusable file is a startup error.
pub fn load_prompts(path: &str) -> Result<Prompts, AppError> {
  let raw = std::fs::read_to_string(path)
    .map_err(|e| AppError::Configuration(format!("Failed to read {}: {}", path, e)))?;
  let file = toml::from_str::<PromptsFile>(&raw)
    .map_err(|e| AppError::Configuration(format!("Failed to parse {}: {}", path, e)))?;
  info!(target: "situate_backend", %path, "Loaded prompt overrides (TOML)");
  Ok(file.prompts)
}
