//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{Id, IdMarker};
use crate::domain::{ScheduleId, TxId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は別タブ・別端末でも衝突しない ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_tx_id(&self) -> TxId;

    fn generate_schedule_id(&self) -> ScheduleId;
}

/// UlidGenerator は Clock の時刻から ULID を作る
///
/// FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next<T: IdMarker>(&self) -> Id<T> {
        let timestamp_ms = self.clock.now_millis().max(0) as u64;
        Id::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_tx_id(&self) -> TxId {
        self.next()
    }

    fn generate_schedule_id(&self) -> ScheduleId {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_schedule_id();
        let id2 = id_gen.generate_schedule_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_uses_clock_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_tx_id();
        let id2 = id_gen.generate_tx_id();

        // ランダム部分があるので ID は異なるが timestamp は同じ
        assert_ne!(id1, id2);
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn different_id_types_are_generated() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_tx_id().to_string().starts_with("tx-"));
        assert!(id_gen.generate_schedule_id().to_string().starts_with("sched-"));
    }
}
