//! Loading quiz configuration (prompts, session timings, extra fallback
//! questions) from TOML.
//!
//! See `QuizConfig`, `Prompts`, and `SessionSettings` for the expected schema:
//!
//! ```toml
//! [prompts]
//! question_system = "..."
//! question_user_template = "Generate unique {difficulty} question on {topic}. [id:{nonce}]"
//!
//! [session]
//! fetch_timeout_secs = 20
//! feedback_delay_ms = 500
//!
//! [[bank]]
//! question = "..."
//! options = ["a", "b", "c", "d"]
//! answer = "b"
//! explanation = "..."
//! topic = "Nouns"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::RawQuestion;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub session: SessionSettings,
  /// Extra fallback questions, validated when the bank is built.
  #[serde(default)]
  pub bank: Vec<RawQuestion>,
}

/// Prompts used by the OpenAI client. Placeholders: `{topic}`, `{difficulty}`, `{nonce}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_system: String,
  pub question_user_template: String,
  /// Substituted for `{topic}` when the student picked "Random".
  pub random_topic_phrase: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You write multiple-choice English grammar questions for school students. \
        Return JSON: {\"question\": string, \"options\": [4 distinct strings], \"answer\": string (one of options), \
        \"explanation\": string, \"topic\": string}. No extra text."
        .into(),
      question_user_template: "Generate unique {difficulty} question on {topic}. [id:{nonce}]".into(),
      random_topic_phrase: "any English grammar topic of your choice".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
  /// Upper bound on one generator call before falling back.
  pub fetch_timeout_secs: u64,
  /// Delay before the tutor's "correct"/"incorrect" acknowledgement.
  pub feedback_delay_ms: u64,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self { fetch_timeout_secs: 20, feedback_delay_ms: 500 }
  }
}

impl SessionSettings {
  pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs) }
  pub fn feedback_delay(&self) -> Duration { Duration::from_millis(self.feedback_delay_ms) }
}

pub fn parse_config(s: &str) -> Result<QuizConfig, toml::de::Error> {
  toml::from_str::<QuizConfig>(s)
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_quiz_config_from_env() -> Option<QuizConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "grammar_quiz", %path, bank_entries = cfg.bank.len(), "Loaded quiz config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "grammar_quiz", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "grammar_quiz", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
