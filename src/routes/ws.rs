//! WebSocket upgrade + message loop. Each connection owns one quiz session.
//! Client messages are parsed as JSON and forwarded to the session runner;
//! we reply with a single JSON message per request and additionally push the
//! delayed answer feedback as it fires.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::runner::QuizRunner;
use crate::session::Feedback;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "grammar_quiz", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "grammar_quiz", "WebSocket connected");
  let runner = state.new_runner();
  let mut feedback_rx = runner.subscribe_feedback();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "grammar_quiz", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &runner).await
              }
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };
            if !send_json(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      feedback = feedback_rx.recv() => {
        match feedback {
          Ok(fb) => {
            if !send_json(&mut socket, &feedback_message(fb)).await {
              break;
            }
          }
          Err(RecvError::Lagged(skipped)) => warn!(target: "grammar_quiz", skipped, "WS feedback lagged"),
          Err(RecvError::Closed) => break,
        }
      }
    }
  }
  info!(target: "grammar_quiz", "WebSocket disconnected");
}

fn feedback_message(fb: Feedback) -> ServerWsMessage {
  ServerWsMessage::Feedback { question_index: fb.question_index, correct: fb.correct, text: fb.text }
}

/// Serialize and send; false when the socket is gone.
async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });

  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "grammar_quiz", error = %e, "WS send error");
    return false;
  }
  true
}

#[instrument(level = "info", skip(runner))]
async fn handle_client_ws(msg: ClientWsMessage, runner: &QuizRunner) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Snapshot => ServerWsMessage::State { snapshot: runner.snapshot().await },

    ClientWsMessage::Start(start) => {
      let started = match start.into_profile() {
        Ok(profile) => runner.start(profile).await,
        Err(e) => Err(e),
      };
      match started {
        Ok(snapshot) => {
          info!(target: "quiz", index = snapshot.question_index, "WS start served");
          ServerWsMessage::State { snapshot }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::SelectAnswer { option } => {
      let (outcome, snapshot) = runner.select_answer(&option).await;
      info!(target: "quiz", score = snapshot.score, "WS select_answer evaluated");
      ServerWsMessage::AnswerResult { outcome: (&outcome).into(), snapshot }
    }

    ClientWsMessage::Next => ServerWsMessage::State { snapshot: runner.next().await },

    ClientWsMessage::Restart => ServerWsMessage::State { snapshot: runner.restart().await },

    ClientWsMessage::DownloadReport => match runner.report().await {
      Some(report) => {
        info!(target: "quiz", filename = %report.filename(), score = report.score, "WS report exported");
        ServerWsMessage::Report { filename: report.filename(), html: report.render_html() }
      }
      None => ServerWsMessage::Error { message: "Report is available once the quiz is finished.".into() },
    },
  }
}
