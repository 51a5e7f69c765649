//! Minimal OpenAI client used as the quiz question source.
//!
//! We only call chat.completions in JSON-object mode, then validate the payload
//! against the question schema before accepting it.
//! Calls are instrumented and log model names, latencies, and sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{Question, RawQuestion};
use crate::error::SourceError;
use crate::source::{QuestionQuery, QuestionSource};
use crate::util::{fill_template, preview};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
  prompts: Prompts,
}

impl OpenAI {
  pub fn new(api_key: &str, base_url: &str, model: &str, prompts: Prompts) -> Result<Self, SourceError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
      .build()
      .map_err(|e| SourceError::Network(e.to_string()))?;

    Ok(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      model: model.to_string(),
      prompts,
    })
  }

  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    match Self::new(&api_key, &base_url, &model, prompts) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "grammar_quiz", error = %e, "Failed to build HTTP client; generator disabled");
        None
      }
    }
  }

  /// JSON-object chat completion. Returns the raw message content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json_content(&self, system: &str, user: &str, temperature: f32) -> Result<String, SourceError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "grammar-quiz-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| {
        if e.is_timeout() {
          SourceError::Timeout(HTTP_TIMEOUT_SECS)
        } else {
          SourceError::Network(e.to_string())
        }
      })?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      if status.as_u16() == 429 {
        return Err(SourceError::RateLimited(msg));
      }
      return Err(SourceError::Api { status: status.as_u16(), message: msg });
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| SourceError::Malformed(format!("completion body: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    body.choices.first()
      .and_then(|c| c.message.content.clone())
      .filter(|c| !c.trim().is_empty())
      .ok_or_else(|| SourceError::Malformed("empty completion".into()))
  }

  fn render_prompts(&self, query: &QuestionQuery) -> (String, String) {
    let topic = if query.topic.is_random() { self.prompts.random_topic_phrase.as_str() } else { query.topic.as_str() };
    let pairs = [
      ("topic", topic),
      ("difficulty", query.difficulty.as_str()),
      ("nonce", query.nonce.as_str()),
    ];
    (
      fill_template(&self.prompts.question_system, &pairs),
      fill_template(&self.prompts.question_user_template, &pairs),
    )
  }
}

#[async_trait]
impl QuestionSource for OpenAI {
  fn name(&self) -> &str { "openai" }

  #[instrument(level = "info", skip(self, query), fields(topic = %query.topic, difficulty = %query.difficulty, model = %self.model))]
  async fn generate(&self, query: &QuestionQuery) -> Result<Question, SourceError> {
    let (system, user) = self.render_prompts(query);
    let start = Instant::now();
    let result = self.chat_json_content(&system, &user, 0.9).await;
    let elapsed = start.elapsed();

    let content = match result {
      Ok(c) => {
        info!(?elapsed, content_len = c.len(), "Model response received");
        c
      }
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during question generation");
        return Err(e);
      }
    };

    let question = parse_question(&content)?;
    info!(
      question_preview = %preview(question.text(), 40),
      topic = %question.topic(),
      "Question successfully generated"
    );
    Ok(question)
  }
}

/// Parse model output into a validated question. Tolerates a surrounding
/// markdown code fence.
pub fn parse_question(content: &str) -> Result<Question, SourceError> {
  let body = strip_code_fence(content);
  let raw: RawQuestion = serde_json::from_str(body)
    .map_err(|e| SourceError::Malformed(format!("JSON parse error: {e}")))?;
  Ok(Question::try_from(raw)?)
}

fn strip_code_fence(s: &str) -> &str {
  let t = s.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
