//! Lesson question generation: one chat call per lesson topic.
//!
//! Failures never reach the caller as errors. The teacher gets a fixed apology
//! and the operator gets the underlying cause in the logs.

use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::error::AppError;
use crate::openai::ChatClient;
use crate::util::{fill_template, trunc_for_log};

pub const GENERATION_FALLBACK: &str = "Sorry, we couldn't generate questions. Please try again later.";

const LESSON_TEMPERATURE: f32 = 0.7;

/// System and user messages for a lesson.
pub fn lesson_messages(prompts: &Prompts, lesson: &str, locale: Option<&str>) -> (String, String) {
  let mut user = fill_template(&prompts.lesson_user_template, &[("lesson", lesson)]);
  if let Some(locale) = locale.map(str::trim).filter(|l| !l.is_empty()) {
    user.push_str(&fill_template(&prompts.lesson_locale_template, &[("locale", locale)]));
  }
  (prompts.lesson_system.clone(), user)
}

/// Generate higher-order questions for `lesson`.
///
/// Returns `Err` only for empty input (a warning for the teacher). Remote
/// failures yield `Ok(GENERATION_FALLBACK)`.
#[instrument(level = "info", skip(client, prompts, lesson), fields(lesson_len = lesson.len(), has_locale = locale.is_some()))]
pub async fn generate_questions(
  client: &ChatClient,
  prompts: &Prompts,
  lesson: &str,
  locale: Option<&str>,
) -> Result<String, AppError> {
  let lesson = lesson.trim();
  if lesson.is_empty() {
    return Err(AppError::validation("Please provide a topic or lesson before submitting."));
  }

  let (system, user) = lesson_messages(prompts, lesson, locale);
  match client.chat_plain(Some(&system), &user, LESSON_TEMPERATURE, None).await {
    Ok(text) if !text.is_empty() => {
      info!(target: "lesson", lesson = %trunc_for_log(lesson, 60), response_len = text.len(), "Questions generated");
      Ok(text)
    }
    Ok(_) => {
      error!(target: "lesson", "Model returned an empty completion");
      Ok(GENERATION_FALLBACK.to_string())
    }
    Err(e) => {
      error!(target: "lesson", error = %e, "Question generation failed");
      Ok(GENERATION_FALLBACK.to_string())
    }
  }
}
