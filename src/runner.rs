//! Drives one `QuizSession`: serializes intents, resolves question requests
//! against the session's own question source (with a timeout and fallback),
//! and delivers the delayed answer acknowledgement.
//!
//! Each question request is tagged with the runner's epoch. `start` and
//! `restart` bump the epoch, so a response that outlives a reset is dropped
//! instead of overwriting the new session.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, instrument, warn};

use crate::config::SessionSettings;
use crate::domain::StudentProfile;
use crate::error::{SessionError, SourceError};
use crate::report::ReportSummary;
use crate::seeds::FallbackBank;
use crate::session::{AnswerOutcome, Feedback, NextStep, Phase, QuizSession, SessionSnapshot};
use crate::source::{QuestionQuery, QuestionSource};

const FEEDBACK_CHANNEL_CAPACITY: usize = 16;

struct Inner {
  epoch: u64,
  session: QuizSession,
}

pub struct QuizRunner {
  source: Arc<dyn QuestionSource>,
  bank: Arc<FallbackBank>,
  settings: SessionSettings,
  inner: Arc<Mutex<Inner>>,
  feedback_tx: broadcast::Sender<Feedback>,
}

impl QuizRunner {
  pub fn new(source: Arc<dyn QuestionSource>, bank: Arc<FallbackBank>, settings: SessionSettings) -> Self {
    let (feedback_tx, _) = broadcast::channel(FEEDBACK_CHANNEL_CAPACITY);
    Self {
      source,
      bank,
      settings,
      inner: Arc::new(Mutex::new(Inner { epoch: 0, session: QuizSession::new() })),
      feedback_tx,
    }
  }

  /// Acknowledgements published after the feedback delay.
  pub fn subscribe_feedback(&self) -> broadcast::Receiver<Feedback> {
    self.feedback_tx.subscribe()
  }

  pub async fn snapshot(&self) -> SessionSnapshot {
    self.inner.lock().await.session.snapshot()
  }

  pub async fn phase(&self) -> Phase {
    self.inner.lock().await.session.phase()
  }

  #[instrument(level = "info", skip(self, profile), fields(topic = %profile.topic, difficulty = %profile.difficulty))]
  pub async fn start(&self, profile: StudentProfile) -> Result<SessionSnapshot, SessionError> {
    let (epoch, query) = {
      let mut inner = self.inner.lock().await;
      let query = inner.session.start(profile)?;
      inner.epoch += 1;
      (inner.epoch, query)
    };
    Ok(self.resolve(epoch, query).await)
  }

  pub async fn select_answer(&self, option: &str) -> (AnswerOutcome, SessionSnapshot) {
    let mut inner = self.inner.lock().await;
    let outcome = inner.session.select_answer(option);
    if let AnswerOutcome::Recorded(feedback) = &outcome {
      self.schedule_feedback(inner.epoch, feedback.clone());
    }
    (outcome, inner.session.snapshot())
  }

  pub async fn next(&self) -> SessionSnapshot {
    let (epoch, step) = {
      let mut inner = self.inner.lock().await;
      (inner.epoch, inner.session.next())
    };
    match step {
      NextStep::Fetch(query) => self.resolve(epoch, query).await,
      NextStep::Finished | NextStep::Ignored => self.snapshot().await,
    }
  }

  pub async fn restart(&self) -> SessionSnapshot {
    let mut inner = self.inner.lock().await;
    inner.epoch += 1;
    inner.session.restart();
    inner.session.snapshot()
  }

  /// Report for a finished quiz; `None` while the quiz is still running.
  pub async fn report(&self) -> Option<ReportSummary> {
    let inner = self.inner.lock().await;
    (inner.session.phase() == Phase::Finished)
      .then(|| ReportSummary::from_session(&inner.session))
      .flatten()
  }

  /// Run one question request with the session lock released, then install
  /// the result (or a fallback) if the session was not reset meanwhile.
  #[instrument(level = "debug", skip(self, query), fields(source = self.source.name()))]
  async fn resolve(&self, epoch: u64, query: QuestionQuery) -> SessionSnapshot {
    let timeout = self.settings.fetch_timeout();
    let outcome = match tokio::time::timeout(timeout, self.source.generate(&query)).await {
      Ok(result) => result,
      Err(_) => Err(SourceError::Timeout(timeout.as_secs())),
    };

    let mut inner = self.inner.lock().await;
    if inner.epoch != epoch {
      warn!(target: "quiz", request_epoch = epoch, current_epoch = inner.epoch, "Discarding stale question response");
      return inner.session.snapshot();
    }
    {
      let mut rng = rand::thread_rng();
      inner.session.complete_fetch(outcome, &self.bank, &mut rng);
    }
    inner.session.snapshot()
  }

  fn schedule_feedback(&self, epoch: u64, feedback: Feedback) {
    let inner = self.inner.clone();
    let tx = self.feedback_tx.clone();
    let delay = self.settings.feedback_delay();
    tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let mut guard = inner.lock().await;
      if guard.epoch != epoch || !guard.session.deliver_feedback(&feedback) {
        debug!(target: "quiz", "Session reset before feedback; dropped");
        return;
      }
      // No subscribers is fine: the transcript already has the message.
      let _ = tx.send(feedback);
    });
  }
}
