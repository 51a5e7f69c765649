//! Scoring summary and the downloadable HTML report.
//!
//! Everything here is a pure function of a finished session's history.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{HistoryItem, TOTAL_QUESTIONS};
use crate::session::QuizSession;
use crate::util::{html_escape, sanitize_file_stem};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TopicStats {
  pub correct: u32,
  pub total: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
  pub name: String,
  pub class: String,
  pub score: u32,
  pub total: u32,
  pub accuracy_pct: u32,
  pub topic_breakdown: BTreeMap<String, TopicStats>,
}

/// Count of history entries marked correct.
pub fn score(history: &[HistoryItem]) -> u32 {
  history.iter().filter(|h| h.is_correct).count() as u32
}

/// `round(score / total * 100)`; zero when `total` is zero.
pub fn accuracy_pct(score: u32, total: u32) -> u32 {
  if total == 0 {
    return 0;
  }
  (f64::from(score) / f64::from(total) * 100.0).round() as u32
}

pub fn topic_breakdown(history: &[HistoryItem]) -> BTreeMap<String, TopicStats> {
  let mut out: BTreeMap<String, TopicStats> = BTreeMap::new();
  for item in history {
    let stats = out.entry(item.question.topic().to_string()).or_default();
    stats.total += 1;
    if item.is_correct {
      stats.correct += 1;
    }
  }
  out
}

impl ReportSummary {
  pub fn from_history(name: &str, class: &str, history: &[HistoryItem]) -> Self {
    let score = score(history);
    Self {
      name: name.to_string(),
      class: class.to_string(),
      score,
      total: TOTAL_QUESTIONS,
      accuracy_pct: accuracy_pct(score, TOTAL_QUESTIONS),
      topic_breakdown: topic_breakdown(history),
    }
  }

  /// `None` when the session was never started.
  pub fn from_session(session: &QuizSession) -> Option<Self> {
    let profile = session.profile()?;
    Some(Self::from_history(&profile.name, &profile.class, session.history()))
  }

  /// `Report_<name>.html`, with the name reduced to filename-safe characters.
  pub fn filename(&self) -> String {
    format!("Report_{}.html", sanitize_file_stem(&self.name, "student"))
  }

  pub fn render_html(&self) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>Results: {}</title>\n", html_escape(&self.name)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str(&format!("<h1>Results: {}</h1>\n", html_escape(&self.name)));
    if !self.class.trim().is_empty() {
      html.push_str(&format!("<p class=\"meta\">Class: {}</p>\n", html_escape(&self.class)));
    }
    html.push_str(&format!("<h2>Score: {}/{}</h2>\n", self.score, self.total));
    html.push_str(&format!("<p class=\"accuracy\">Accuracy: {}%</p>\n", self.accuracy_pct));

    if !self.topic_breakdown.is_empty() {
      html.push_str("<table>\n<thead><tr><th>Topic</th><th>Correct</th><th>Answered</th></tr></thead>\n<tbody>\n");
      for (topic, stats) in &self.topic_breakdown {
        html.push_str(&format!(
          "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
          html_escape(topic),
          stats.correct,
          stats.total,
        ));
      }
      html.push_str("</tbody></table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
  }
}

const CSS: &str = "body{font-family:sans-serif;padding:40px}\n\
table{border-collapse:collapse;margin-top:16px}\n\
th,td{border:1px solid #ccc;padding:4px 12px;text-align:left}\n\
.meta{color:#555}\n";
