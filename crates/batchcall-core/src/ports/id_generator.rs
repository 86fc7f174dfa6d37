//! IdGenerator port - JobKey 生成の抽象化
//!
//! JobKey はファイル名に使うので、同じ作業ディレクトリで同時に作られた
//! Job 同士でも衝突してはいけません。ULID（時刻 + 80bit 乱数）で保証します。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::JobKey;
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_job_key(&self) -> JobKey;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// これにより、テスト時に FixedClock を使って timestamp 部分を固定できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_key(&self) -> JobKey {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        JobKey::from(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn ulid_generator_generates_unique_keys() {
        let id_gen = UlidGenerator::new(SystemClock);
        let keys: HashSet<JobKey> = (0..100).map(|_| id_gen.generate_job_key()).collect();
        assert_eq!(keys.len(), 100);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_still_differs() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let k1 = id_gen.generate_job_key();
        let k2 = id_gen.generate_job_key();

        // FixedClock を使っても、ランダム部分があるので key は異なる
        assert_ne!(k1, k2);
        assert_eq!(k1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(k2.as_ulid().timestamp_ms(), k1.as_ulid().timestamp_ms());
    }
}
