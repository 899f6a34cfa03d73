//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock の時刻を timestamp 部分に使う）

use crate::domain::ids::SweepId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は sweep ごとの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（trigger と手動実行の両方から使う）
pub trait IdGenerator: Send + Sync {
    fn generate_sweep_id(&self) -> SweepId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_sweep_id(&self) -> SweepId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        SweepId::from(ulid)
    }
}
