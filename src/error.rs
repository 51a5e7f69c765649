//! Error types for quiz sessions and the question source.

use thiserror::Error;

use crate::session::Phase;

/// A generated or configured question that does not fit the question schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
  #[error("missing or blank field `{0}`")]
  MissingField(&'static str),

  #[error("expected exactly 4 options, got {0}")]
  OptionCount(usize),

  #[error("duplicate option `{0}`")]
  DuplicateOption(String),

  #[error("answer `{0}` is not one of the options")]
  AnswerNotInOptions(String),
}

/// Intents the session refuses. Raised at the boundary, never stored in session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
  #[error("student name must not be blank")]
  BlankName,

  #[error("student class must not be blank")]
  BlankClass,

  #[error("unknown topic: {0}")]
  UnknownTopic(String),

  #[error("cannot {action} while the session is {phase}")]
  InvalidTransition { action: &'static str, phase: Phase },
}

/// Question source failures. Every variant is absorbed by the fallback bank.
#[derive(Debug, Error)]
pub enum SourceError {
  /// No generator is configured (no API key).
  #[error("question generator disabled")]
  Disabled,

  /// The API returned a 429 (quota or rate limit).
  #[error("rate limited: {0}")]
  RateLimited(String),

  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },

  #[error("network error: {0}")]
  Network(String),

  #[error("request timed out after {0}s")]
  Timeout(u64),

  /// The response was not a parseable question object.
  #[error("malformed response: {0}")]
  Malformed(String),

  #[error("schema violation: {0}")]
  Schema(#[from] SchemaViolation),
}
