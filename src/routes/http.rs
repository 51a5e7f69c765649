//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! session runner. Each handler is instrumented and logs the session id and
//! basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::error::SessionError;
use crate::protocol::*;
use crate::runner::QuizRunner;
use crate::state::AppState;

/// Failures surfaced to HTTP clients. Question source problems never get here.
#[derive(Debug)]
pub enum ApiError {
  UnknownSession(String),
  Session(SessionError),
  NotFinished,
}

impl From<SessionError> for ApiError {
  fn from(e: SessionError) -> Self { ApiError::Session(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::UnknownSession(id) => (StatusCode::NOT_FOUND, format!("unknown session: {id}")),
      ApiError::Session(e @ SessionError::InvalidTransition { .. }) => (StatusCode::CONFLICT, e.to_string()),
      ApiError::Session(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      ApiError::NotFinished => (StatusCode::CONFLICT, "report is available once the quiz is finished".into()),
    };
    (status, Json(ErrorOut { error: message })).into_response()
  }
}

async fn session(state: &AppState, id: &str) -> Result<Arc<QuizRunner>, ApiError> {
  state.get_session(id).await.ok_or_else(|| ApiError::UnknownSession(id.to_string()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_catalog() -> impl IntoResponse { Json(CatalogOut::current()) }

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (session_id, runner) = state.create_session().await;
  let snapshot = runner.snapshot().await;
  (StatusCode::CREATED, Json(SessionCreatedOut { session_id, snapshot }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  Ok(Json(runner.snapshot().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  if state.remove_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::UnknownSession(id))
  }
}

#[instrument(level = "info", skip(state, body), fields(name_len = body.name.len()))]
pub async fn http_start(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<StartIn>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  let snapshot = runner.start(body.into_profile()?).await?;
  info!(target: "quiz", session_id = %id, phase = %snapshot.phase, "HTTP start served");
  Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state, body), fields(option_len = body.option.len()))]
pub async fn http_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  let (outcome, snapshot) = runner.select_answer(&body.option).await;
  info!(target: "quiz", session_id = %id, score = snapshot.score, "HTTP answer evaluated");
  Ok(Json(AnswerOut { outcome: (&outcome).into(), snapshot }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_next(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  let snapshot = runner.next().await;
  info!(target: "quiz", session_id = %id, index = snapshot.question_index, phase = %snapshot.phase, "HTTP next served");
  Ok(Json(snapshot))
}

#[instrument(level = "info", skip(state))]
pub async fn http_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  Ok(Json(runner.restart().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_report(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let runner = session(&state, &id).await?;
  let report = runner.report().await.ok_or(ApiError::NotFinished)?;
  let filename = report.filename();
  info!(target: "quiz", session_id = %id, %filename, score = report.score, "HTTP report exported");

  // The filename is reduced to [A-Za-z0-9_-], so it is always a valid header value.
  let disposition = format!("attachment; filename=\"{filename}\"");
  Ok((
    [
      (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    report.render_html(),
  ))
}
