//! Application state: the in-memory session registry plus what every new
//! session is built from (question source, fallback bank, timings).
//!
//! If OpenAI is unavailable, sessions get the offline source and every
//! question comes from the fallback bank.
//!
//! The registry is capped at `max_sessions`. Creating a session at the cap
//! first evicts every session that is idle or finished; quizzes in progress
//! are only removed by an explicit delete.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_quiz_config_from_env, QuizConfig, SessionSettings};
use crate::openai::OpenAI;
use crate::runner::QuizRunner;
use crate::seeds::FallbackBank;
use crate::session::Phase;
use crate::source::{OfflineSource, QuestionSource};

pub const DEFAULT_MAX_SESSIONS: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, Arc<QuizRunner>>>>,
    pub source: Arc<dyn QuestionSource>,
    pub bank: Arc<FallbackBank>,
    pub settings: SessionSettings,
    pub max_sessions: usize,
}

impl AppState {
    /// Build state from env: load config, build the bank, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Self {
        let cfg = load_quiz_config_from_env().unwrap_or_default();
        let QuizConfig { prompts, session, bank } = cfg;

        let source: Arc<dyn QuestionSource> = match OpenAI::from_env(prompts) {
            Some(oa) => {
                info!(target: "grammar_quiz", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "grammar_quiz", "OpenAI disabled (no OPENAI_API_KEY). Serving fallback questions only.");
                Arc::new(OfflineSource)
            }
        };

        Self::new(source, FallbackBank::with_extra(bank), session)
    }

    pub fn new(source: Arc<dyn QuestionSource>, bank: FallbackBank, settings: SessionSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            source,
            bank: Arc::new(bank),
            settings,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// A fresh idle session with its own handle to the question source.
    pub fn new_runner(&self) -> QuizRunner {
        QuizRunner::new(self.source.clone(), self.bank.clone(), self.settings.clone())
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> (String, Arc<QuizRunner>) {
        let id = Uuid::new_v4().to_string();
        let runner = Arc::new(self.new_runner());
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            let evicted = evict_inactive(&mut sessions).await;
            warn!(target: "quiz", evicted, remaining = sessions.len(), "Session registry full; evicted inactive sessions");
        }
        sessions.insert(id.clone(), runner.clone());
        info!(target: "quiz", session_id = %id, total = sessions.len(), "Session created");
        (id, runner)
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: &str) -> Option<Arc<QuizRunner>> {
        self.sessions.read().await.get(id).cloned()
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(target: "quiz", session_id = %id, "Session removed");
        }
        removed
    }
}

/// Drop idle and finished sessions; returns how many were removed.
async fn evict_inactive(sessions: &mut HashMap<String, Arc<QuizRunner>>) -> usize {
    let mut stale = Vec::new();
    for (id, runner) in sessions.iter() {
        if matches!(runner.phase().await, Phase::Idle | Phase::Finished) {
            stale.push(id.clone());
        }
    }
    for id in &stale {
        sessions.remove(id);
    }
    stale.len()
}
