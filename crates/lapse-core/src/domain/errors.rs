//! Errors - エラー型と分類
//!
//! Sweep-wide vs per-item:
//! - `SweepError` is the only error that escapes `Sweeper::run()`.
//! - `EvaluationError` and `TransitionError` are per-quote and end up as report entries.
//! - `StoreError` is what the quote store port returns for any failed call.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::ids::QuoteId;

/// Failure of one call against the quote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("quote {0} not found")]
    NotFound(QuoteId),

    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot decode store response: {0}")]
    Decode(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Which deadline field the policy consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeadlineField {
    #[serde(rename = "expectedQuoteCompletionDate")]
    ExpectedCompletion,
    #[serde(rename = "requestedQuoteCompletionDate")]
    RequestedCompletion,
}

impl fmt::Display for DeadlineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineField::ExpectedCompletion => f.write_str("expectedQuoteCompletionDate"),
            DeadlineField::RequestedCompletion => f.write_str("requestedQuoteCompletionDate"),
        }
    }
}

/// A deadline field could not be interpreted; the quote is skipped for this sweep.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("quote {quote_id}: cannot parse {field} value {raw:?}: {source}")]
pub struct EvaluationError {
    pub quote_id: QuoteId,
    pub field: DeadlineField,
    pub raw: String,
    #[source]
    pub source: chrono::ParseError,
}

/// The two ordered side effects of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStep {
    StatusUpdate,
    NoteAppend,
}

impl fmt::Display for TransitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionStep::StatusUpdate => f.write_str("status_update"),
            TransitionStep::NoteAppend => f.write_str("note_append"),
        }
    }
}

/// Failure of one quote's transition.
///
/// `NoteAppend` means the status update already went through: the quote is
/// cancelled but carries no expiration note.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("status update failed for quote {quote_id}: {source}")]
    StatusUpdate {
        quote_id: QuoteId,
        #[source]
        source: StoreError,
    },

    #[error("note append failed for quote {quote_id} after status update: {source}")]
    NoteAppend {
        quote_id: QuoteId,
        #[source]
        source: StoreError,
    },
}

impl TransitionError {
    pub fn step(&self) -> TransitionStep {
        match self {
            TransitionError::StatusUpdate { .. } => TransitionStep::StatusUpdate,
            TransitionError::NoteAppend { .. } => TransitionStep::NoteAppend,
        }
    }

    pub fn quote_id(&self) -> &QuoteId {
        match self {
            TransitionError::StatusUpdate { quote_id, .. }
            | TransitionError::NoteAppend { quote_id, .. } => quote_id,
        }
    }

    pub fn cause(&self) -> &StoreError {
        match self {
            TransitionError::StatusUpdate { source, .. }
            | TransitionError::NoteAppend { source, .. } => source,
        }
    }

    /// State changed but the annotation is missing.
    pub fn is_partial(&self) -> bool {
        matches!(self, TransitionError::NoteAppend { .. })
    }
}

/// Sweep-wide failure: nothing was transitioned.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to fetch quote snapshot: {0}")]
    Fetch(#[source] StoreError),

    #[error("a sweep is already running")]
    AlreadyRunning,
}
