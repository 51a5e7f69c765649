//! Fallback question bank: built-in questions that keep a quiz going when the
//! generator is unavailable, plus any extra entries from the TOML config.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, info};

use crate::domain::{Question, RawQuestion};

/// Built-in entries that guarantee the quiz is usable without OpenAI or config.
fn seed_raw_questions() -> Vec<RawQuestion> {
  let q = |question: &str, options: [&str; 4], answer: &str, explanation: &str, topic: &str| RawQuestion {
    question: Some(question.into()),
    options: Some(options.iter().map(|o| o.to_string()).collect()),
    answer: Some(answer.into()),
    explanation: Some(explanation.into()),
    topic: Some(topic.into()),
  };
  vec![
    q(
      "Identify the Noun in the sentence: 'The sun shines brightly.'",
      ["The", "Sun", "Shines", "Brightly"],
      "Sun",
      "A noun is a naming word. 'Sun' is the name of the star.",
      "Nouns",
    ),
    q(
      "Which word is a Verb?",
      ["Run", "Happy", "Table", "Green"],
      "Run",
      "A verb indicates an action. 'Run' is an action.",
      "Verbs",
    ),
    q(
      "Select the Adjective: 'She has a red car.'",
      ["She", "Has", "Red", "Car"],
      "Red",
      "An adjective describes a noun. 'Red' describes the car.",
      "Adjectives",
    ),
    q(
      "Fill in the blank: 'He is ___ honest man.'",
      ["A", "An", "The", "No article"],
      "An",
      "We use 'an' before words starting with a vowel sound. 'Honest' starts with a vowel sound.",
      "Articles",
    ),
    q(
      "What is the plural of 'Child'?",
      ["Childs", "Children", "Childrens", "Childes"],
      "Children",
      "'Child' is an irregular noun. Its plural is 'Children'.",
      "Nouns",
    ),
  ]
}

/// Immutable, never-empty list of fallback questions.
#[derive(Clone, Debug)]
pub struct FallbackBank {
  questions: Vec<Question>,
}

impl FallbackBank {
  /// Built-in seeds only.
  pub fn builtin() -> Self {
    Self::with_extra(Vec::new())
  }

  /// Built-in seeds followed by configured entries. Entries that fail schema
  /// validation are skipped.
  pub fn with_extra(extra: Vec<RawQuestion>) -> Self {
    let mut questions = Vec::new();
    for (i, raw) in seed_raw_questions().into_iter().chain(extra).enumerate() {
      let preview = raw.question.clone().unwrap_or_default();
      match Question::try_from(raw) {
        Ok(q) => {
          if questions.iter().any(|existing: &Question| existing.text() == q.text()) {
            error!(target: "quiz", index = i, question = %preview, "Skipping bank item: duplicate question text.");
            continue;
          }
          questions.push(q);
        }
        Err(e) => {
          error!(target: "quiz", index = i, question = %preview, error = %e, "Skipping bank item: schema violation.");
        }
      }
    }
    info!(target: "quiz", size = questions.len(), "Fallback bank ready");
    Self { questions }
  }

  #[cfg(test)]
  pub fn len(&self) -> usize { self.questions.len() }

  #[cfg(test)]
  pub fn questions(&self) -> &[Question] { &self.questions }

  /// Uniform random pick, preferring entries whose text is not in `seen`.
  /// When every entry has been seen, picks uniformly from the whole bank.
  pub fn pick<R: Rng + ?Sized>(&self, seen: &HashSet<String>, rng: &mut R) -> Question {
    let unseen: Vec<&Question> = self
      .questions
      .iter()
      .filter(|q| !seen.contains(q.text()))
      .collect();

    let chosen = if unseen.is_empty() {
      self.questions.choose(rng)
    } else {
      unseen.choose(rng).copied()
    };

    // The built-in seeds always validate, so the bank is never empty.
    chosen.cloned().unwrap_or_else(hard_fallback_question)
  }
}

/// Absolute last resort when the bank is somehow empty.
fn hard_fallback_question() -> Question {
  Question::try_from(seed_raw_questions().swap_remove(1))
    .unwrap_or_else(|_| unreachable!("built-in seed question is schema-valid"))
}
