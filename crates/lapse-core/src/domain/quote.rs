//! Quote snapshot model.
//!
//! The shape follows the upstream quote API: camelCase fields, deadlines as
//! calendar-date strings, notes under `note`. Deadlines stay raw strings here;
//! interpreting them is the job of the expiration policy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::QuoteId;
use super::state::QuoteState;

/// An annotation attached to a quote. Notes are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub author: String,

    /// Unreadable dates decode as `None`; notes are never evaluated.
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<DateTime<Utc>>,

    pub text: String,
}

impl Note {
    pub fn new(author: impl Into<String>, date: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            date: Some(date),
            text: text.into(),
        }
    }
}

/// RFC 3339 timestamp, or a bare `%Y-%m-%d` date taken as midnight UTC.
/// Anything else (other formats, numbers, objects) becomes `None`.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = value.as_ref().and_then(|v| v.as_str()).map(str::trim) else {
        return Ok(None);
    };
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(date.with_timezone(&Utc)));
    }
    Ok(NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc()))
}

/// A point-in-time view of one quote as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,

    pub state: QuoteState,

    /// Primary deadline signal.
    #[serde(
        default,
        rename = "expectedQuoteCompletionDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_completion_date: Option<String>,

    /// Fallback deadline, only consulted when the primary is absent or empty.
    #[serde(
        default,
        rename = "requestedQuoteCompletionDate",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_completion_date: Option<String>,

    #[serde(default, rename = "note", skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Quote {
    pub fn new(id: impl Into<QuoteId>, state: QuoteState) -> Self {
        Self {
            id: id.into(),
            state,
            expected_completion_date: None,
            requested_completion_date: None,
            notes: Vec::new(),
        }
    }

    pub fn with_expected_completion(mut self, date: impl Into<String>) -> Self {
        self.expected_completion_date = Some(date.into());
        self
    }

    pub fn with_requested_completion(mut self, date: impl Into<String>) -> Self {
        self.requested_completion_date = Some(date.into());
        self
    }

    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    /// Whether an identical note (same author and text) is already attached.
    pub fn has_note(&self, author: &str, text: &str) -> bool {
        self.notes
            .iter()
            .any(|note| note.author == author && note.text == text)
    }
}
