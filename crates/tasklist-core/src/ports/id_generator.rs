//! IdGenerator port - ID 生成の抽象化
//!
//! 本番ではリモートストアが ID を採番します。InMemory ストアはこの trait で採番します。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::TaskId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は TaskId を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// FixedClock を渡すと timestamp 部分が固定されます（ランダム部分は異なる）。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        TaskId::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
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

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();
        let id3 = id_gen.generate_task_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        // ただし、timestamp 部分は同じはず
        let ulid1 = Ulid::from_string(id1.as_str()).unwrap();
        let ulid2 = Ulid::from_string(id2.as_str()).unwrap();
        assert_eq!(ulid1.timestamp_ms(), ulid2.timestamp_ms());
        assert_eq!(ulid1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
