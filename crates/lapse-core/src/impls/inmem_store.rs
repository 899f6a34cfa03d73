//! InMemoryQuoteStore - 開発用・テスト用の QuoteStore
//!
//! # 学習ポイント
//! - `std::sync::Mutex` は await をまたがない範囲でのみ lock する
//! - 呼び出し履歴（`StoreCall`）を残してテストから副作用の順序を検証できる
//! - quote ごとの失敗注入で部分成功のシナリオを再現する

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Note, Quote, QuoteId, QuoteState, StoreError};
use crate::ports::{Clock, QuoteStore, SystemClock};

/// One call received by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    UpdateStatus {
        quote_id: QuoteId,
        state: QuoteState,
        actor: String,
    },
    AppendNote {
        quote_id: QuoteId,
        author: String,
        text: String,
    },
}

#[derive(Default)]
struct Failures {
    list: Option<StoreError>,
    update_status: HashMap<QuoteId, StoreError>,
    append_note: HashMap<QuoteId, StoreError>,
}

#[derive(Default)]
struct Inner {
    // insertion order is the snapshot order
    quotes: Vec<Quote>,
    calls: Vec<StoreCall>,
    failures: Failures,
}

impl Inner {
    fn find_mut(&mut self, quote_id: &QuoteId) -> Result<&mut Quote, StoreError> {
        self.quotes
            .iter_mut()
            .find(|q| &q.id == quote_id)
            .ok_or_else(|| StoreError::NotFound(quote_id.clone()))
    }
}

/// QuoteStore backed by process memory.
///
/// Failures injected with `fail_*` are sticky until `clear_failures`.
pub struct InMemoryQuoteStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl InMemoryQuoteStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    pub fn with_quotes(clock: Arc<dyn Clock>, quotes: impl IntoIterator<Item = Quote>) -> Self {
        let store = Self::new(clock);
        for quote in quotes {
            store.insert(quote);
        }
        store
    }

    /// Seed from a JSON array of quotes in the upstream wire shape.
    pub fn from_json_file(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let quotes: Vec<Quote> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Decode(format!("{}: {e}", path.display())))?;
        Ok(Self::with_quotes(clock, quotes))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a quote by id.
    pub fn insert(&self, quote: Quote) {
        let mut inner = self.lock();
        match inner.quotes.iter_mut().find(|q| q.id == quote.id) {
            Some(existing) => *existing = quote,
            None => inner.quotes.push(quote),
        }
    }

    pub fn quote(&self, quote_id: &QuoteId) -> Option<Quote> {
        self.lock().quotes.iter().find(|q| &q.id == quote_id).cloned()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.lock().quotes.clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn fail_list(&self, err: StoreError) {
        self.lock().failures.list = Some(err);
    }

    pub fn fail_update_status(&self, quote_id: impl Into<QuoteId>, err: StoreError) {
        self.lock()
            .failures
            .update_status
            .insert(quote_id.into(), err);
    }

    pub fn fail_append_note(&self, quote_id: impl Into<QuoteId>, err: StoreError) {
        self.lock().failures.append_note.insert(quote_id.into(), err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures = Failures::default();
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::List);
        if let Some(err) = &inner.failures.list {
            return Err(err.clone());
        }
        Ok(inner.quotes.clone())
    }

    async fn update_status(
        &self,
        quote_id: &QuoteId,
        state: QuoteState,
        actor: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::UpdateStatus {
            quote_id: quote_id.clone(),
            state: state.clone(),
            actor: actor.to_string(),
        });
        if let Some(err) = inner.failures.update_status.get(quote_id) {
            return Err(err.clone());
        }
        inner.find_mut(quote_id)?.state = state;
        Ok(())
    }

    async fn append_note(
        &self,
        quote_id: &QuoteId,
        author: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.calls.push(StoreCall::AppendNote {
            quote_id: quote_id.clone(),
            author: author.to_string(),
            text: text.to_string(),
        });
        if let Some(err) = inner.failures.append_note.get(quote_id) {
            return Err(err.clone());
        }
        inner
            .find_mut(quote_id)?
            .notes
            .push(Note::new(author, now, text));
        Ok(())
    }
}

impl Default for InMemoryQuoteStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::NaiveDate;
    use std::io::Write;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::on(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()))
    }

    fn store() -> InMemoryQuoteStore {
        InMemoryQuoteStore::with_quotes(
            clock(),
            [
                Quote::new("A", QuoteState::InProgress).with_expected_completion("2024-01-01"),
                Quote::new("B", QuoteState::Pending),
            ],
        )
    }

    #[tokio::test]
    async fn list_returns_snapshot_in_insertion_order() {
        let store = store();
        let ids: Vec<_> = store
            .list_quotes()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![QuoteId::new("A"), QuoteId::new("B")]);
    }

    #[tokio::test]
    async fn update_status_is_idempotent() {
        let store = store();
        let id = QuoteId::new("A");
        store
            .update_status(&id, QuoteState::Cancelled, "system")
            .await
            .unwrap();
        store
            .update_status(&id, QuoteState::Cancelled, "system")
            .await
            .unwrap();
        assert!(store.quote(&id).unwrap().state.is_cancelled());
    }

    #[tokio::test]
    async fn append_note_accumulates_with_clock_date() {
        let store = store();
        let id = QuoteId::new("A");
        store.append_note(&id, "system", "one").await.unwrap();
        store.append_note(&id, "system", "one").await.unwrap();

        let quote = store.quote(&id).unwrap();
        assert_eq!(quote.notes.len(), 2);
        assert_eq!(quote.notes[0].date, Some(clock().now()));
        assert!(quote.has_note("system", "one"));
    }

    #[tokio::test]
    async fn unknown_quote_is_not_found() {
        let store = store();
        let id = QuoteId::new("missing");
        let err = store
            .update_status(&id, QuoteState::Cancelled, "system")
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(id.clone()));
        assert!(store.append_note(&id, "system", "x").await.is_err());
    }

    #[tokio::test]
    async fn injected_failures_leave_state_untouched() {
        let store = store();
        let id = QuoteId::new("A");
        store.fail_update_status("A", StoreError::Timeout);
        store.fail_list(StoreError::Unavailable("down".to_string()));

        assert!(store.list_quotes().await.is_err());
        assert_eq!(
            store
                .update_status(&id, QuoteState::Cancelled, "system")
                .await,
            Err(StoreError::Timeout)
        );
        assert_eq!(store.quote(&id).unwrap().state, QuoteState::InProgress);

        store.clear_failures();
        store
            .update_status(&id, QuoteState::Cancelled, "system")
            .await
            .unwrap();
        assert_eq!(store.calls().len(), 3);
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let store = store();
        let id = QuoteId::new("B");
        store.list_quotes().await.unwrap();
        store
            .update_status(&id, QuoteState::Cancelled, "system")
            .await
            .unwrap();
        store.append_note(&id, "system", "bye").await.unwrap();

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::List,
                StoreCall::UpdateStatus {
                    quote_id: id.clone(),
                    state: QuoteState::Cancelled,
                    actor: "system".to_string(),
                },
                StoreCall::AppendNote {
                    quote_id: id,
                    author: "system".to_string(),
                    text: "bye".to_string(),
                },
            ]
        );
    }

    #[test]
    fn seeds_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
              {{"id": "A", "state": "inProgress", "expectedQuoteCompletionDate": "2024-01-01"}},
              {{"id": "B", "state": "cancelled", "note": [{{"author": "alice", "text": "hi"}}]}}
            ]"#
        )
        .unwrap();

        let store = InMemoryQuoteStore::from_json_file(file.path(), clock()).unwrap();
        let quotes = store.quotes();
        assert_eq!(quotes.len(), 2);
        assert_eq!(
            quotes[0].expected_completion_date.as_deref(),
            Some("2024-01-01")
        );
        assert!(quotes[1].has_note("alice", "hi"));
    }

    #[test]
    fn bad_seed_file_maps_to_store_errors() {
        let missing = InMemoryQuoteStore::from_json_file(Path::new("/no/such/seed.json"), clock());
        assert!(matches!(missing, Err(StoreError::Unavailable(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let garbage = InMemoryQuoteStore::from_json_file(file.path(), clock());
        assert!(matches!(garbage, Err(StoreError::Decode(_))));
    }
}
