//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: 設定からのワイヤリングと起動時検証
//! - **Sweeper**: 1 回分の sweep（fetch → evaluate → transition → report）
//! - **TransitionExecutor**: cancelled への更新と note 追加
//! - **DailyTrigger**: 1 日 1 回の起動

pub mod builder;
pub mod executor;
pub mod sweeper;
pub mod trigger;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::executor::{EXPIRATION_NOTE, SYSTEM_ACTOR, TransitionExecutor};
pub use self::sweeper::{SweepOptions, Sweeper};
pub use self::trigger::{DailyTrigger, TriggerHandle, next_firing};
