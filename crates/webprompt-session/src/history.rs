//! In-memory conversation history.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcript::format_record;

/// What was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Text,
    Image,
}

/// How the response wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Content arrived within the window.
    Success,
    /// The interface finished without rendering anything.
    Empty,
    /// Submission failed, the driver faulted, or the window elapsed.
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Empty => write!(f, "empty"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One prompt/response pair. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    prompt: String,
    response: String,
    timestamp: DateTime<Utc>,
    kind: ExchangeKind,
    outcome: Outcome,
    elapsed_ms: u64,
}

impl Exchange {
    pub(crate) fn new(
        prompt: String,
        response: String,
        kind: ExchangeKind,
        outcome: Outcome,
        elapsed: Duration,
    ) -> Self {
        Self {
            prompt,
            response,
            timestamp: Utc::now(),
            kind,
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Time from submission to the end of the wait.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    fn matches(&self, needle: &str) -> bool {
        self.prompt.to_lowercase().contains(needle) || self.response.to_lowercase().contains(needle)
    }
}

/// Ordered log of every exchange in the session.
///
/// Unbounded: memory grows with the session. Fine for human-paced use.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: Vec<Exchange>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, exchange: Exchange) {
        self.entries.push(exchange);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Exchange] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Exchange> {
        self.entries.iter()
    }

    /// Case-insensitive substring match on prompt or response, in order.
    pub fn search(&self, term: &str) -> Vec<Exchange> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.matches(&needle))
            .cloned()
            .collect()
    }

    /// `Q:/A:` records for the whole history, oldest first.
    pub fn clipboard_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format_record(e.prompt(), e.response()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a HistoryStore {
    type Item = &'a Exchange;
    type IntoIter = std::slice::Iter<'a, Exchange>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
