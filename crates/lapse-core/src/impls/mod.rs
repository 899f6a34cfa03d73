//! Impls - QuoteStore の実装
//!
//! # 含まれる実装
//! - **HttpQuoteStore**: 本番用。upstream の quote API に REST で接続
//! - **InMemoryQuoteStore**: 開発用・テスト用。JSON ファイルから seed 可能

pub mod http_store;
pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::http_store::{HttpQuoteStore, HttpStoreOptions};
pub use self::inmem_store::{InMemoryQuoteStore, StoreCall};
