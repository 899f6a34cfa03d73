//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（quote API, 時計, ID 生成）へのインターフェースを提供し、
//! 実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - quote store が source of truth（このサービスは状態を持たない）
//! - 時刻と ID は trait 経由で差し替え可能（テスト容易性）

pub mod clock;
pub mod id_generator;
pub mod quote_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::quote_store::QuoteStore;
pub use crate::domain::StoreError;

#[cfg(test)]
pub use self::quote_store::MockQuoteStore;
