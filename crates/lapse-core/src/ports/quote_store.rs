//! QuoteStore port - クオートの正本（source of truth）へのアクセス
//!
//! QuoteStore は外部の quote API（または開発用の InMemory 実装）を抽象化します。
//!
//! # 設計原則
//! - sweep は `list_quotes()` のスナップショットだけを元に判断する
//! - `update_status` は冪等（cancelled を再度 cancelled にしてもエラーにしない）
//! - `append_note` は冪等ではない（呼ぶたびに note が増える）

use async_trait::async_trait;

use crate::domain::{Quote, QuoteId, QuoteState, StoreError};

/// Client side of the quote store.
///
/// Every call may fail with a `StoreError`; timeouts are ordinary failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Full snapshot of every quote the store knows about.
    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError>;

    /// Set the state of one quote, attributed to `actor`.
    async fn update_status(
        &self,
        quote_id: &QuoteId,
        state: QuoteState,
        actor: &str,
    ) -> Result<(), StoreError>;

    /// Append one note. Calling twice appends twice.
    async fn append_note(
        &self,
        quote_id: &QuoteId,
        author: &str,
        text: &str,
    ) -> Result<(), StoreError>;
}
