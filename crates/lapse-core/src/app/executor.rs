//! TransitionExecutor - 期限切れクオートの状態遷移
//!
//! # フロー
//! 1. `QuoteStore::update_status()` で cancelled に更新（system actor 名義）
//! 2. 1 が成功した場合のみ `QuoteStore::append_note()` で固定文言の note を追加
//!
//! 2 の失敗は「状態は変わったが note がない」部分成功として報告し、同じ run の中では
//! リトライしません（append_note は冪等ではないため）。

use std::sync::Arc;

use tracing::debug;

use crate::domain::{QuoteId, QuoteState, TransitionError};
use crate::ports::QuoteStore;

/// Identity attributed to automated mutations.
pub const SYSTEM_ACTOR: &str = "system";

/// Text of the note recording an automatic expiration.
pub const EXPIRATION_NOTE: &str =
    "Quote cancelled automatically by the system: completion date has passed.";

/// Performs the two ordered side effects of expiring one quote.
#[derive(Clone)]
pub struct TransitionExecutor {
    store: Arc<dyn QuoteStore>,
    actor: String,
    note_text: String,
}

impl TransitionExecutor {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self::with_identity(store, SYSTEM_ACTOR, EXPIRATION_NOTE)
    }

    pub fn with_identity(
        store: Arc<dyn QuoteStore>,
        actor: impl Into<String>,
        note_text: impl Into<String>,
    ) -> Self {
        Self {
            store,
            actor: actor.into(),
            note_text: note_text.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn note_text(&self) -> &str {
        &self.note_text
    }

    /// Cancel `quote_id` and record why.
    ///
    /// The note is only appended after the status update succeeded, and at most
    /// once per call.
    pub async fn transition(&self, quote_id: &QuoteId) -> Result<(), TransitionError> {
        self.store
            .update_status(quote_id, QuoteState::Cancelled, &self.actor)
            .await
            .map_err(|source| TransitionError::StatusUpdate {
                quote_id: quote_id.clone(),
                source,
            })?;
        debug!(quote_id = %quote_id, "status updated to cancelled");

        self.annotate(quote_id).await
    }

    /// Append the expiration note only (step 2).
    pub async fn annotate(&self, quote_id: &QuoteId) -> Result<(), TransitionError> {
        self.store
            .append_note(quote_id, &self.actor, &self.note_text)
            .await
            .map_err(|source| TransitionError::NoteAppend {
                quote_id: quote_id.clone(),
                source,
            })?;
        debug!(quote_id = %quote_id, "expiration note appended");
        Ok(())
    }
}
