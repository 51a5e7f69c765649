//! Domain models used by the backend: questions, topics, difficulty, and the
//! per-answer history records a quiz session accumulates.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaViolation, SessionError};

/// Number of questions in every quiz run.
pub const TOTAL_QUESTIONS: u32 = 10;

/// Topics offered to the student. `Random` lets the generator pick freely.
pub const GRAMMAR_TOPICS: [&str; 22] = [
  "Random", "General", "Nouns", "Verbs", "Adjectives", "Adverbs",
  "Prepositions", "Tenses", "Active Voice", "Passive Voice",
  "Direct Speech", "Indirect Speech", "Clauses", "Degrees of Comparison",
  "Advice", "Synonyms", "Antonyms", "Articles", "Conjunctions",
  "Interchanging Sentences", "Jumbled Sentences", "Questions and Auxiliary verbs",
];

const RANDOM_TOPIC: &str = "Random";

/// A grammar topic from `GRAMMAR_TOPICS`, stored in its canonical spelling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Topic(&'static str);

impl Topic {
  /// Case-insensitive lookup against the fixed topic list.
  pub fn parse(s: &str) -> Result<Self, SessionError> {
    let wanted = s.trim();
    GRAMMAR_TOPICS
      .iter()
      .find(|t| t.eq_ignore_ascii_case(wanted))
      .map(|t| Topic(*t))
      .ok_or_else(|| SessionError::UnknownTopic(wanted.to_string()))
  }

  pub fn random() -> Self { Topic(RANDOM_TOPIC) }

  pub fn is_random(&self) -> bool { self.0 == RANDOM_TOPIC }

  pub fn as_str(&self) -> &'static str { self.0 }
}

impl Default for Topic {
  fn default() -> Self { Topic::random() }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.0) }
}

impl<'de> Deserialize<'de> for Topic {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let s = String::deserialize(d)?;
    Topic::parse(&s).map_err(serde::de::Error::custom)
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Everything the student picks on the welcome screen. Immutable during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
  pub name: String,
  pub class: String,
  #[serde(default)]
  pub topic: Topic,
  #[serde(default)]
  pub difficulty: Difficulty,
}

impl StudentProfile {
  /// Blank (empty or whitespace-only) name or class refuses the start.
  pub fn validate(&self) -> Result<(), SessionError> {
    if self.name.trim().is_empty() {
      return Err(SessionError::BlankName);
    }
    if self.class.trim().is_empty() {
      return Err(SessionError::BlankClass);
    }
    Ok(())
  }
}

/// Unchecked question payload, as produced by the generator or a TOML bank.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RawQuestion {
  #[serde(default)] pub question: Option<String>,
  #[serde(default)] pub options: Option<Vec<String>>,
  #[serde(default)] pub answer: Option<String>,
  #[serde(default)] pub explanation: Option<String>,
  #[serde(default)] pub topic: Option<String>,
}

/// A schema-valid multiple-choice question: four distinct options, the answer
/// among them, and every field non-blank. Only constructible via validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion")]
pub struct Question {
  question: String,
  options: Vec<String>,
  answer: String,
  explanation: String,
  topic: String,
}

impl Question {
  pub const OPTION_COUNT: usize = 4;

  #[cfg(test)]
  pub fn new(
    question: &str,
    options: [&str; 4],
    answer: &str,
    explanation: &str,
    topic: &str,
  ) -> Result<Self, SchemaViolation> {
    Question::try_from(RawQuestion {
      question: Some(question.into()),
      options: Some(options.iter().map(|o| o.to_string()).collect()),
      answer: Some(answer.into()),
      explanation: Some(explanation.into()),
      topic: Some(topic.into()),
    })
  }

  pub fn text(&self) -> &str { &self.question }
  pub fn options(&self) -> &[String] { &self.options }
  pub fn answer(&self) -> &str { &self.answer }
  pub fn explanation(&self) -> &str { &self.explanation }
  pub fn topic(&self) -> &str { &self.topic }

  pub fn is_correct(&self, option: &str) -> bool { option == self.answer }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, SchemaViolation> {
  match value.map(|v| v.trim().to_string()) {
    Some(v) if !v.is_empty() => Ok(v),
    _ => Err(SchemaViolation::MissingField(field)),
  }
}

impl TryFrom<RawQuestion> for Question {
  type Error = SchemaViolation;

  fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
    let question = required("question", raw.question)?;
    let answer = required("answer", raw.answer)?;
    let explanation = required("explanation", raw.explanation)?;
    let topic = required("topic", raw.topic)?;

    let options: Vec<String> = raw
      .options
      .ok_or(SchemaViolation::MissingField("options"))?
      .into_iter()
      .map(|o| o.trim().to_string())
      .collect();
    if options.len() != Question::OPTION_COUNT {
      return Err(SchemaViolation::OptionCount(options.len()));
    }
    if options.iter().any(|o| o.is_empty()) {
      return Err(SchemaViolation::MissingField("options"));
    }
    let mut distinct = HashSet::new();
    if let Some(dup) = options.iter().find(|o| !distinct.insert(o.as_str())) {
      return Err(SchemaViolation::DuplicateOption(dup.clone()));
    }
    if !options.contains(&answer) {
      return Err(SchemaViolation::AnswerNotInOptions(answer));
    }

    Ok(Question { question, options, answer, explanation, topic })
  }
}

/// Where did the current question come from?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrigin {
  Generated,
  Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServedQuestion {
  pub question: Question,
  pub origin: QuestionOrigin,
}

/// One answered question, in the order answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
  pub question: Question,
  pub user_answer: String,
  pub is_correct: bool,
  pub origin: QuestionOrigin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
  User,
  Tutor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranscriptMessage {
  pub speaker: Speaker,
  pub text: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(options: &[&str], answer: &str) -> RawQuestion {
    RawQuestion {
      question: Some("Pick the verb".into()),
      options: Some(options.iter().map(|s| s.to_string()).collect()),
      answer: Some(answer.into()),
      explanation: Some("Verbs are actions.".into()),
      topic: Some("Verbs".into()),
    }
  }

  #[test]
  fn accepts_well_formed_question() {
    let q = Question::try_from(raw(&["Run", "Happy", "Table", "Green"], "Run")).unwrap();
    assert_eq!(q.options().len(), 4);
    assert!(q.is_correct("Run"));
    assert!(!q.is_correct("Table"));
  }

  #[test]
  fn rejects_wrong_option_count() {
    let err = Question::try_from(raw(&["Run", "Happy", "Table"], "Run")).unwrap_err();
    assert_eq!(err, SchemaViolation::OptionCount(3));
    let err = Question::try_from(raw(&["Run", "Happy", "Table", "Green", "Blue"], "Run")).unwrap_err();
    assert_eq!(err, SchemaViolation::OptionCount(5));
  }

  #[test]
  fn rejects_answer_outside_options() {
    let err = Question::try_from(raw(&["Run", "Happy", "Table", "Green"], "Walk")).unwrap_err();
    assert_eq!(err, SchemaViolation::AnswerNotInOptions("Walk".into()));
  }

  #[test]
  fn rejects_duplicate_options() {
    let err = Question::try_from(raw(&["Run", "Run", "Table", "Green"], "Run")).unwrap_err();
    assert_eq!(err, SchemaViolation::DuplicateOption("Run".into()));
  }

  #[test]
  fn rejects_missing_and_blank_fields() {
    let mut r = raw(&["Run", "Happy", "Table", "Green"], "Run");
    r.explanation = None;
    assert_eq!(Question::try_from(r).unwrap_err(), SchemaViolation::MissingField("explanation"));

    let mut r = raw(&["Run", "Happy", "Table", "Green"], "Run");
    r.question = Some("   ".into());
    assert_eq!(Question::try_from(r).unwrap_err(), SchemaViolation::MissingField("question"));
  }

  #[test]
  fn deserialization_goes_through_validation() {
    let ok = r#"{"question":"q","options":["a","b","c","d"],"answer":"c","explanation":"e","topic":"t"}"#;
    assert!(serde_json::from_str::<Question>(ok).is_ok());

    let bad = r#"{"question":"q","options":["a","b"],"answer":"a","explanation":"e","topic":"t"}"#;
    assert!(serde_json::from_str::<Question>(bad).is_err());
  }

  #[test]
  fn topic_parse_is_case_insensitive_and_canonical() {
    let t = Topic::parse("passive voice").unwrap();
    assert_eq!(t.as_str(), "Passive Voice");
    assert!(Topic::parse(" random ").unwrap().is_random());
    assert_eq!(
      Topic::parse("Calculus").unwrap_err(),
      SessionError::UnknownTopic("Calculus".into())
    );
  }

  #[test]
  fn profile_refuses_blank_name_or_class() {
    let mut p = StudentProfile {
      name: "Asha".into(),
      class: "6".into(),
      topic: Topic::default(),
      difficulty: Difficulty::Easy,
    };
    assert!(p.validate().is_ok());
    p.class = "  ".into();
    assert_eq!(p.validate().unwrap_err(), SessionError::BlankClass);
    p.name = "".into();
    assert_eq!(p.validate().unwrap_err(), SessionError::BlankName);
  }
}
