//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, StudentProfile, Topic, GRAMMAR_TOPICS, TOTAL_QUESTIONS};
use crate::session::{AnswerOutcome, SessionSnapshot};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Snapshot,
    Start(StartIn),
    SelectAnswer { option: String },
    Next,
    Restart,
    DownloadReport,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        snapshot: SessionSnapshot,
    },
    AnswerResult {
        outcome: AnswerOutcomeOut,
        snapshot: SessionSnapshot,
    },
    /// Pushed after the feedback delay, independent of any request.
    Feedback {
        question_index: u32,
        correct: bool,
        text: String,
    },
    Report {
        filename: String,
        html: String,
    },
    Error {
        message: String,
    },
}

/// Start request: the student's welcome-screen choices.
#[derive(Debug, Deserialize)]
pub struct StartIn {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl StartIn {
    /// Topic names are checked here; blank name/class are checked by the session.
    pub fn into_profile(self) -> Result<StudentProfile, crate::error::SessionError> {
        let topic = match self.topic.as_deref() {
            Some(t) => Topic::parse(t)?,
            None => Topic::default(),
        };
        Ok(StudentProfile {
            name: self.name.trim().to_string(),
            class: self.class.trim().to_string(),
            topic,
            difficulty: self.difficulty.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcomeOut {
    Ignored,
    Recorded { correct: bool },
}

impl From<&AnswerOutcome> for AnswerOutcomeOut {
    fn from(o: &AnswerOutcome) -> Self {
        match o {
            AnswerOutcome::Ignored => AnswerOutcomeOut::Ignored,
            AnswerOutcome::Recorded(fb) => AnswerOutcomeOut::Recorded { correct: fb.correct },
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct CatalogOut {
    pub topics: Vec<&'static str>,
    pub difficulties: Vec<Difficulty>,
    pub total_questions: u32,
    pub default_topic: &'static str,
    pub default_difficulty: Difficulty,
}

impl CatalogOut {
    pub fn current() -> Self {
        Self {
            topics: GRAMMAR_TOPICS.to_vec(),
            difficulties: Difficulty::ALL.to_vec(),
            total_questions: TOTAL_QUESTIONS,
            default_topic: Topic::default().as_str(),
            default_difficulty: Difficulty::default(),
        }
    }
}

#[derive(Serialize)]
pub struct SessionCreatedOut {
    pub session_id: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub option: String,
}

#[derive(Serialize)]
pub struct AnswerOut {
    pub outcome: AnswerOutcomeOut,
    pub snapshot: SessionSnapshot,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_client_messages() {
        let m: ClientWsMessage = serde_json::from_str(
            r#"{"type":"start","name":"Asha","class":"6","topic":"nouns","difficulty":"Easy"}"#,
        )
        .unwrap();
        let ClientWsMessage::Start(start) = m else { panic!("expected start") };
        let p = start.into_profile().unwrap();
        assert_eq!(p.topic.as_str(), "Nouns");
        assert_eq!(p.difficulty, Difficulty::Easy);

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_answer","option":"Sun"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectAnswer { ref option } if option == "Sun"));
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"next"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Next));
    }

    #[test]
    fn start_defaults_to_random_medium() {
        let s = StartIn { name: " Asha ".into(), class: "6".into(), topic: None, difficulty: None };
        let p = s.into_profile().unwrap();
        assert!(p.topic.is_random());
        assert_eq!(p.difficulty, Difficulty::Medium);
        assert_eq!(p.name, "Asha");
    }

    #[test]
    fn feedback_serializes_with_type_tag() {
        let msg = ServerWsMessage::Feedback { question_index: 2, correct: false, text: "Not quite.".into() };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "feedback");
        assert_eq!(v["correct"], false);
    }
}
