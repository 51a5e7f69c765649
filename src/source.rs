//! Question source seam: anything that can produce one validated `Question`
//! for a topic/difficulty request.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{Difficulty, Question, Topic};
use crate::error::SourceError;

/// One request to the generator. `nonce` is unique per request so the model
/// does not hand back the same question verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionQuery {
  pub topic: Topic,
  pub difficulty: Difficulty,
  pub nonce: String,
}

#[async_trait]
pub trait QuestionSource: Send + Sync {
  fn name(&self) -> &str;

  /// Produce one schema-valid question or fail. Callers collapse every
  /// failure into the fallback path.
  async fn generate(&self, query: &QuestionQuery) -> Result<Question, SourceError>;
}

/// Used when no generator is configured: every request fails, so every
/// question comes from the fallback bank.
pub struct OfflineSource;

#[async_trait]
impl QuestionSource for OfflineSource {
  fn name(&self) -> &str { "offline" }

  async fn generate(&self, _query: &QuestionQuery) -> Result<Question, SourceError> {
    Err(SourceError::Disabled)
  }
}

#[cfg(test)]
pub mod testing {
  //! Scripted source for session and route tests.

  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;
  use std::time::Duration;

  use super::*;

  pub enum Step {
    Succeed(Question),
    Fail,
    /// Wait before answering; used to race a restart or hit the timeout.
    Delay(Duration, Box<Step>),
  }

  /// Replays `steps` in order; once exhausted every call fails.
  pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    queries: Mutex<Vec<QuestionQuery>>,
  }

  impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
      Self {
        steps: Mutex::new(steps.into()),
        calls: AtomicU32::new(0),
        queries: Mutex::new(Vec::new()),
      }
    }

    pub fn always_failing() -> Self { Self::new(Vec::new()) }

    pub fn call_count(&self) -> u32 { self.calls.load(Ordering::SeqCst) }

    pub fn queries(&self) -> Vec<QuestionQuery> { self.queries.lock().unwrap().clone() }
  }

  pub fn numbered_question(n: u32) -> Question {
    Question::new(
      &format!("Generated question #{n}: pick the noun"),
      ["quickly", "river", "blue", "sing"],
      "river",
      "'River' names a thing.",
      "Nouns",
    )
    .unwrap()
  }

  #[async_trait]
  impl QuestionSource for ScriptedSource {
    fn name(&self) -> &str { "scripted" }

    async fn generate(&self, query: &QuestionQuery) -> Result<Question, SourceError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.queries.lock().unwrap().push(query.clone());
      let mut step = self.steps.lock().unwrap().pop_front();
      loop {
        match step {
          Some(Step::Succeed(q)) => return Ok(q),
          Some(Step::Fail) | None => return Err(SourceError::Network("scripted failure".into())),
          Some(Step::Delay(d, inner)) => {
            tokio::time::sleep(d).await;
            step = Some(*inner);
          }
        }
      }
    }
  }
}
