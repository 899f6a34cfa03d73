//! lapse-core
//!
//! Expires quotes whose completion date has passed: once a day every quote is
//! fetched from the quote store, judged against its deadline, and expired
//! quotes are moved to `cancelled` with a note saying why.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, quote, state, expiration policy, report, errors）
//! - **ports**: 抽象化レイヤー（QuoteStore, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, sweeper, executor, trigger）
//! - **impls**: 実装（HttpQuoteStore, InMemoryQuoteStore）
//! - **settings**: 設定の読み込みと検証
//! - **observability**: tracing の初期化

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod settings;
