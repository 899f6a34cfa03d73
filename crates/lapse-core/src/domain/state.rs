//! Quote state as reported by the quote store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// QuoteState はクオートの状態を表現
///
/// The store is the source of truth for which states exist; this service only
/// needs to recognise `Cancelled`. Unknown values are preserved in `Other` so a
/// snapshot never fails to decode because upstream added a state.
///
/// Parsing ignores surrounding whitespace, ASCII case and `_`/`-`/space
/// separators, so `"inProgress"`, `"IN_PROGRESS"` and `" in progress "` are
/// the same state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuoteState {
    InProgress,
    Pending,
    Approved,
    Accepted,
    Rejected,
    Cancelled,
    Other(String),
}

impl QuoteState {
    /// Terminal for expiration purposes: never re-evaluated by the sweep.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QuoteState::Cancelled)
    }

    /// Wire name used when writing the state back to the store.
    pub fn as_str(&self) -> &str {
        match self {
            QuoteState::InProgress => "inProgress",
            QuoteState::Pending => "pending",
            QuoteState::Approved => "approved",
            QuoteState::Accepted => "accepted",
            QuoteState::Rejected => "rejected",
            QuoteState::Cancelled => "cancelled",
            QuoteState::Other(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "inprogress" => QuoteState::InProgress,
            "pending" => QuoteState::Pending,
            "approved" => QuoteState::Approved,
            "accepted" => QuoteState::Accepted,
            "rejected" => QuoteState::Rejected,
            // British and American spellings both appear upstream.
            "cancelled" | "canceled" => QuoteState::Cancelled,
            _ => QuoteState::Other(raw.to_string()),
        }
    }
}

impl From<String> for QuoteState {
    fn from(raw: String) -> Self {
        QuoteState::parse(&raw)
    }
}

impl From<QuoteState> for String {
    fn from(state: QuoteState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for QuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
