//! Quiz session state machine.
//!
//! `QuizSession` is plain data plus synchronous transitions; it performs no IO.
//! Transitions that need a new question return a `QuestionQuery` which the
//! caller resolves (see `runner`) and feeds back through `complete_fetch`.
//!
//! ```text
//!   Idle --start--> Loading --complete_fetch--> Active --select_answer--> Active
//!                     ^                            |
//!                     +-----------next (i < 10)----+
//!                                                  +--next (i == 10)--> Finished
//!   any --restart--> Idle
//! ```

use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
  HistoryItem, Question, QuestionOrigin, ServedQuestion, Speaker, StudentProfile, TranscriptMessage,
  TOTAL_QUESTIONS,
};
use crate::error::{SessionError, SourceError};
use crate::seeds::FallbackBank;
use crate::source::QuestionQuery;

pub const CORRECT_FEEDBACK: &str = "Correct! Well done.";
pub const INCORRECT_FEEDBACK: &str = "Not quite. Check the explanation.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  #[default]
  Idle,
  Loading,
  Active,
  Finished,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Phase::Idle => "idle",
      Phase::Loading => "loading",
      Phase::Active => "active",
      Phase::Finished => "finished",
    })
  }
}

/// Acknowledgement owed to the student after an answer. Delivered later,
/// decoupled from the transition itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Feedback {
  pub question_index: u32,
  pub correct: bool,
  pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerOutcome {
  /// Already answered, or no question on screen.
  Ignored,
  Recorded(Feedback),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextStep {
  /// Current question not answered yet, or not in `Active`.
  Ignored,
  Fetch(QuestionQuery),
  Finished,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuizSession {
  phase: Phase,
  profile: Option<StudentProfile>,
  question_index: u32,
  score: u32,
  current: Option<ServedQuestion>,
  selected: Option<String>,
  answered: bool,
  history: Vec<HistoryItem>,
  transcript: Vec<TranscriptMessage>,
  seen: HashSet<String>,
}

impl QuizSession {
  pub fn new() -> Self { Self::default() }

  pub fn phase(&self) -> Phase { self.phase }
  pub fn profile(&self) -> Option<&StudentProfile> { self.profile.as_ref() }
  #[cfg(test)]
  pub fn question_index(&self) -> u32 { self.question_index }
  #[cfg(test)]
  pub fn score(&self) -> u32 { self.score }
  #[cfg(test)]
  pub fn current(&self) -> Option<&ServedQuestion> { self.current.as_ref() }
  #[cfg(test)]
  pub fn selected(&self) -> Option<&str> { self.selected.as_deref() }
  #[cfg(test)]
  pub fn answered(&self) -> bool { self.answered }
  pub fn history(&self) -> &[HistoryItem] { &self.history }
  #[cfg(test)]
  pub fn transcript(&self) -> &[TranscriptMessage] { &self.transcript }

  fn query(&self, profile: &StudentProfile) -> QuestionQuery {
    QuestionQuery {
      topic: profile.topic.clone(),
      difficulty: profile.difficulty,
      nonce: Uuid::new_v4().simple().to_string(),
    }
  }

  /// Idle -> Loading. Refused when the profile is incomplete.
  pub fn start(&mut self, profile: StudentProfile) -> Result<QuestionQuery, SessionError> {
    if self.phase != Phase::Idle {
      return Err(SessionError::InvalidTransition { action: "start", phase: self.phase });
    }
    profile.validate()?;

    let query = self.query(&profile);
    info!(target: "quiz", topic = %profile.topic, difficulty = %profile.difficulty, "Quiz started");
    *self = QuizSession {
      phase: Phase::Loading,
      profile: Some(profile),
      question_index: 1,
      ..QuizSession::default()
    };
    Ok(query)
  }

  /// Loading -> Active with either the generated question or a fallback draw.
  /// Returns the origin of the installed question, or `None` outside `Loading`.
  pub fn complete_fetch<R: Rng + ?Sized>(
    &mut self,
    outcome: Result<Question, SourceError>,
    bank: &FallbackBank,
    rng: &mut R,
  ) -> Option<QuestionOrigin> {
    if self.phase != Phase::Loading {
      warn!(target: "quiz", phase = %self.phase, "Question arrived outside loading; dropped");
      return None;
    }

    let (question, origin) = match outcome {
      Ok(q) if self.seen.contains(q.text()) => {
        warn!(target: "quiz", index = self.question_index, "Generated question repeats an earlier one; using fallback");
        (bank.pick(&self.seen, rng), QuestionOrigin::Fallback)
      }
      Ok(q) => (q, QuestionOrigin::Generated),
      Err(e) => {
        warn!(target: "quiz", index = self.question_index, error = %e, "Question source failed; using fallback");
        (bank.pick(&self.seen, rng), QuestionOrigin::Fallback)
      }
    };

    self.seen.insert(question.text().to_string());
    self.current = Some(ServedQuestion { question, origin });
    self.selected = None;
    self.answered = false;
    self.phase = Phase::Active;
    info!(target: "quiz", index = self.question_index, ?origin, "Question ready");
    Some(origin)
  }

  /// Record the student's choice. Only the first selection per question counts.
  pub fn select_answer(&mut self, option: &str) -> AnswerOutcome {
    if self.phase != Phase::Active || self.answered {
      return AnswerOutcome::Ignored;
    }
    let Some(served) = &self.current else {
      return AnswerOutcome::Ignored;
    };

    let correct = served.question.is_correct(option);
    self.history.push(HistoryItem {
      question: served.question.clone(),
      user_answer: option.to_string(),
      is_correct: correct,
      origin: served.origin,
    });
    if correct {
      self.score += 1;
    }
    self.answered = true;
    self.selected = Some(option.to_string());
    self.transcript.push(TranscriptMessage { speaker: Speaker::User, text: option.to_string() });

    info!(target: "quiz", index = self.question_index, %correct, score = self.score, "Answer recorded");
    AnswerOutcome::Recorded(Feedback {
      question_index: self.question_index,
      correct,
      text: if correct { CORRECT_FEEDBACK } else { INCORRECT_FEEDBACK }.to_string(),
    })
  }

  /// Advance after an answered question: fetch the next one or finish.
  pub fn next(&mut self) -> NextStep {
    if self.phase != Phase::Active || !self.answered {
      return NextStep::Ignored;
    }
    let Some(profile) = self.profile.clone() else {
      return NextStep::Ignored;
    };

    if self.question_index < TOTAL_QUESTIONS {
      self.question_index += 1;
      self.answered = false;
      self.selected = None;
      self.current = None;
      self.phase = Phase::Loading;
      NextStep::Fetch(self.query(&profile))
    } else {
      self.phase = Phase::Finished;
      info!(target: "quiz", score = self.score, total = TOTAL_QUESTIONS, "Quiz finished");
      NextStep::Finished
    }
  }

  /// Append the tutor's delayed acknowledgement. Dropped once the session is reset.
  pub fn deliver_feedback(&mut self, feedback: &Feedback) -> bool {
    if self.phase == Phase::Idle {
      return false;
    }
    self.transcript.push(TranscriptMessage { speaker: Speaker::Tutor, text: feedback.text.clone() });
    true
  }

  /// Back to a freshly constructed session.
  pub fn restart(&mut self) {
    info!(target: "quiz", phase = %self.phase, "Quiz reset");
    *self = QuizSession::default();
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot {
      phase: self.phase,
      profile: self.profile.clone(),
      question_index: self.question_index,
      total_questions: TOTAL_QUESTIONS,
      score: self.score,
      current: self.current.as_ref().map(|s| QuestionView::new(s, self.answered)),
      selected: self.selected.clone(),
      answered: self.answered,
      history: self.history.clone(),
      transcript: self.transcript.clone(),
    }
  }
}

/// Read-only view handed to the presentation layer.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
  pub phase: Phase,
  pub profile: Option<StudentProfile>,
  pub question_index: u32,
  pub total_questions: u32,
  pub score: u32,
  pub current: Option<QuestionView>,
  pub selected: Option<String>,
  pub answered: bool,
  pub history: Vec<HistoryItem>,
  pub transcript: Vec<TranscriptMessage>,
}

/// The current question as shown to the student. Answer and explanation are
/// withheld until the question has been answered.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
  pub question: String,
  pub options: Vec<String>,
  pub topic: String,
  pub origin: QuestionOrigin,
  pub answer: Option<String>,
  pub explanation: Option<String>,
}

impl QuestionView {
  fn new(served: &ServedQuestion, answered: bool) -> Self {
    let q = &served.question;
    Self {
      question: q.text().to_string(),
      options: q.options().to_vec(),
      topic: q.topic().to_string(),
      origin: served.origin,
      answer: answered.then(|| q.answer().to_string()),
      explanation: answered.then(|| q.explanation().to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Difficulty, Topic};
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn profile() -> StudentProfile {
    StudentProfile {
      name: "Asha".into(),
      class: "6".into(),
      topic: Topic::parse("Nouns").unwrap(),
      difficulty: Difficulty::Easy,
    }
  }

  fn generated(n: u32) -> Question {
    Question::new(
      &format!("Generated question {n}"),
      ["alpha", "beta", "gamma", "delta"],
      "beta",
      "Beta is right.",
      "Nouns",
    )
    .unwrap()
  }

  fn fixture() -> (QuizSession, FallbackBank, StdRng) {
    (QuizSession::new(), FallbackBank::builtin(), StdRng::seed_from_u64(3))
  }

  fn wrong_option(q: &Question) -> String {
    q.options().iter().find(|o| o.as_str() != q.answer()).cloned().unwrap()
  }

  #[test]
  fn start_refuses_blank_profile_and_stays_idle() {
    let (mut s, _, _) = fixture();
    let mut p = profile();
    p.name = "   ".into();
    assert_eq!(s.start(p).unwrap_err(), SessionError::BlankName);
    assert_eq!(s, QuizSession::default());

    let mut p = profile();
    p.class = String::new();
    assert_eq!(s.start(p).unwrap_err(), SessionError::BlankClass);
    assert_eq!(s.phase(), Phase::Idle);
  }

  #[test]
  fn start_enters_loading_at_question_one() {
    let (mut s, _, _) = fixture();
    let query = s.start(profile()).unwrap();
    assert_eq!(s.phase(), Phase::Loading);
    assert_eq!(s.question_index(), 1);
    assert_eq!(query.topic.as_str(), "Nouns");
    assert_eq!(query.difficulty, Difficulty::Easy);
    assert!(!query.nonce.is_empty());

    let err = s.start(profile()).unwrap_err();
    assert_eq!(err, SessionError::InvalidTransition { action: "start", phase: Phase::Loading });
  }

  #[test]
  fn nonces_differ_between_requests() {
    let (mut s, bank, mut rng) = fixture();
    let first = s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    s.select_answer("beta");
    let NextStep::Fetch(second) = s.next() else { panic!("expected fetch") };
    assert_ne!(first.nonce, second.nonce);
  }

  #[test]
  fn failed_fetch_installs_schema_valid_fallback() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    let origin = s.complete_fetch(Err(SourceError::Disabled), &bank, &mut rng);
    assert_eq!(origin, Some(QuestionOrigin::Fallback));
    assert_eq!(s.phase(), Phase::Active);
    let q = &s.current().unwrap().question;
    assert_eq!(q.options().len(), 4);
    assert!(q.options().iter().any(|o| o == q.answer()));
    assert!(bank.questions().contains(q));
  }

  #[test]
  fn complete_fetch_outside_loading_is_dropped() {
    let (mut s, bank, mut rng) = fixture();
    assert_eq!(s.complete_fetch(Ok(generated(1)), &bank, &mut rng), None);
    assert_eq!(s, QuizSession::default());
  }

  #[test]
  fn selecting_twice_changes_nothing() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);

    let first = s.select_answer("beta");
    assert!(matches!(first, AnswerOutcome::Recorded(Feedback { correct: true, .. })));
    let before = s.clone();

    assert_eq!(s.select_answer("alpha"), AnswerOutcome::Ignored);
    assert_eq!(s, before);
    assert_eq!(s.score(), 1);
    assert_eq!(s.history().len(), 1);
    assert_eq!(s.selected(), Some("beta"));
  }

  #[test]
  fn selecting_while_loading_is_ignored() {
    let (mut s, _, _) = fixture();
    s.start(profile()).unwrap();
    assert_eq!(s.select_answer("beta"), AnswerOutcome::Ignored);
    assert!(s.history().is_empty());
  }

  #[test]
  fn wrong_answer_is_recorded_without_score() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    let AnswerOutcome::Recorded(fb) = s.select_answer("gamma") else { panic!("expected record") };
    assert!(!fb.correct);
    assert_eq!(fb.text, INCORRECT_FEEDBACK);
    assert_eq!(s.score(), 0);
    assert_eq!(s.history().len(), 1);
    assert!(!s.history()[0].is_correct);
    assert_eq!(s.transcript().last().unwrap().text, "gamma");
  }

  #[test]
  fn next_before_answer_is_noop() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    let before = s.clone();
    assert_eq!(s.next(), NextStep::Ignored);
    assert_eq!(s, before);
  }

  #[test]
  fn full_run_with_failing_source_scores_three_of_ten() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    for i in 1..=TOTAL_QUESTIONS {
      s.complete_fetch(Err(SourceError::Network("down".into())), &bank, &mut rng);
      let q = s.current().unwrap().question.clone();
      let pick = if i <= 3 { q.answer().to_string() } else { wrong_option(&q) };
      s.select_answer(&pick);
      let step = s.next();
      if i < TOTAL_QUESTIONS {
        assert!(matches!(step, NextStep::Fetch(_)));
      } else {
        assert_eq!(step, NextStep::Finished);
      }
    }
    assert_eq!(s.phase(), Phase::Finished);
    assert_eq!(s.score(), 3);
    assert_eq!(s.history().len(), 10);
    assert_eq!(s.history().iter().filter(|h| h.is_correct).count() as u32, s.score());
    assert_eq!(s.next(), NextStep::Ignored);
  }

  #[test]
  fn restart_from_finished_equals_fresh_session() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    for _ in 0..TOTAL_QUESTIONS {
      s.complete_fetch(Err(SourceError::Disabled), &bank, &mut rng);
      let answer = s.current().unwrap().question.answer().to_string();
      s.select_answer(&answer);
      let fb = Feedback { question_index: s.question_index(), correct: true, text: CORRECT_FEEDBACK.into() };
      s.deliver_feedback(&fb);
      s.next();
    }
    assert_eq!(s.phase(), Phase::Finished);
    s.restart();
    assert_eq!(s, QuizSession::default());
    assert_eq!(s.question_index(), 0);
    assert!(s.current().is_none());
  }

  #[test]
  fn duplicate_generated_question_is_replaced() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    s.select_answer("beta");
    s.next();
    let origin = s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    assert_eq!(origin, Some(QuestionOrigin::Fallback));
    assert_ne!(s.current().unwrap().question.text(), "Generated question 1");
  }

  #[test]
  fn fallback_draws_do_not_repeat_until_bank_exhausted() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    let mut texts = Vec::new();
    for _ in 0..bank.len() {
      s.complete_fetch(Err(SourceError::Disabled), &bank, &mut rng);
      texts.push(s.current().unwrap().question.text().to_string());
      s.select_answer("x");
      s.next();
    }
    let distinct: HashSet<_> = texts.iter().collect();
    assert_eq!(distinct.len(), bank.len());
  }

  #[test]
  fn snapshot_hides_answer_until_answered() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    let view = s.snapshot().current.unwrap();
    assert!(view.answer.is_none());
    assert!(view.explanation.is_none());

    s.select_answer("alpha");
    let view = s.snapshot().current.unwrap();
    assert_eq!(view.answer.as_deref(), Some("beta"));
    assert_eq!(view.explanation.as_deref(), Some("Beta is right."));
  }

  #[test]
  fn feedback_is_dropped_after_reset() {
    let (mut s, bank, mut rng) = fixture();
    s.start(profile()).unwrap();
    s.complete_fetch(Ok(generated(1)), &bank, &mut rng);
    let AnswerOutcome::Recorded(fb) = s.select_answer("beta") else { panic!("expected record") };
    s.restart();
    assert!(!s.deliver_feedback(&fb));
    assert!(s.transcript().is_empty());
  }
}
