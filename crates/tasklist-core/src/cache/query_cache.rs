//! QueryCache - キー付きの invalidate-on-mutation キャッシュ
//!
//! # 学習ポイント
//! - std Mutex（短いクリティカルセクション）と tokio Mutex（await を跨ぐ single flight）の使い分け
//! - generation カウンタによる「古い fetch 結果で新しい無効化を上書きしない」保証
//!
//! # 不変条件
//! - mutation はキャッシュに書き込まない。`invalidate` するだけ
//! - `invalidate` 後に開始した読み取りは、必ず再取得した値を返す

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::app::status::QueryStatus;
use crate::domain::ClientError;

/// One cache slot.
///
/// Design:
/// - `generation` is bumped by every invalidation.
/// - `fetched_generation` is the generation the stored value was fetched under.
/// - A value is fresh only if both match and it is younger than `stale_time`.
struct Slot<V> {
    value: Option<Arc<V>>,
    fetched_at: Option<Instant>,
    fetched_generation: u64,
    generation: u64,
    status: QueryStatus,
    /// Serialises fetches for this key (single flight).
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: None,
            fetched_at: None,
            fetched_generation: 0,
            generation: 0,
            status: QueryStatus::Idle,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

impl<V> Slot<V> {
    fn fresh_value(&self, stale_time: Duration, now: Instant) -> Option<Arc<V>> {
        let fetched_at = self.fetched_at?;
        if self.fetched_generation != self.generation {
            return None;
        }
        if now.saturating_duration_since(fetched_at) >= stale_time {
            return None;
        }
        self.value.clone()
    }
}

/// Puts the pre-fetch status back if the fetching future is dropped
/// before it finishes (caller cancelled, task aborted).
struct FlightGuard<'a, K: Eq + Hash, V> {
    slots: &'a Mutex<HashMap<K, Slot<V>>>,
    key: &'a K,
    previous: Option<QueryStatus>,
}

impl<K: Eq + Hash, V> FlightGuard<'_, K, V> {
    fn disarm(&mut self) {
        self.previous = None;
    }
}

impl<K: Eq + Hash, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.get_mut(self.key)
            && slot.status.is_loading()
        {
            slot.status = previous;
        }
    }
}

/// Keyed query cache owned by whoever composes queries and mutations.
pub struct QueryCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
    stale_time: Duration,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(stale_time: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached value if it is still fresh.
    pub fn get_fresh(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        self.slots()
            .get(key)
            .and_then(|slot| slot.fresh_value(self.stale_time, now))
    }

    /// Whatever is cached, fresh or not.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.slots().get(key).and_then(|slot| slot.value.clone())
    }

    pub fn status(&self, key: &K) -> QueryStatus {
        self.slots()
            .get(key)
            .map(|slot| slot.status.clone())
            .unwrap_or_default()
    }

    /// Mark `key` stale. The next read refetches, and a fetch already in
    /// flight for `key` will not be treated as fresh when it lands.
    pub fn invalidate(&self, key: &K) {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();
        slot.generation += 1;
        debug!(key = ?key, generation = slot.generation, "cache invalidated");
    }

    pub fn invalidate_all(&self) {
        let mut slots = self.slots();
        for slot in slots.values_mut() {
            slot.generation += 1;
        }
        debug!(keys = slots.len(), "cache invalidated (all)");
    }

    /// Return the fresh value for `key`, or run `fetch` and store its result.
    ///
    /// Concurrent callers for the same key share one fetch: the later ones
    /// wait on the key's gate and then find the value fresh.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<Arc<V>, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ClientError>>,
    {
        let gate = {
            let now = Instant::now();
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_default();
            if let Some(value) = slot.fresh_value(self.stale_time, now) {
                debug!(key = ?key, "cache hit");
                return Ok(value);
            }
            Arc::clone(&slot.gate)
        };

        let _flight = gate.lock().await;

        let (started_generation, previous) = {
            let now = Instant::now();
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_default();
            if let Some(value) = slot.fresh_value(self.stale_time, now) {
                debug!(key = ?key, "cache filled by concurrent fetch");
                return Ok(value);
            }
            let previous = std::mem::replace(&mut slot.status, QueryStatus::Loading);
            (slot.generation, previous)
        };
        let mut flight = FlightGuard {
            slots: &self.slots,
            key: &key,
            previous: Some(previous),
        };

        debug!(key = ?key, "cache miss, fetching");
        let result = fetch().await;
        flight.disarm();

        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();
        match result {
            Ok(value) => {
                let value = Arc::new(value);
                slot.value = Some(Arc::clone(&value));
                slot.fetched_at = Some(Instant::now());
                slot.fetched_generation = started_generation;
                slot.status = QueryStatus::Success;
                if started_generation != slot.generation {
                    debug!(key = ?key, "fetched value was invalidated in flight");
                }
                Ok(value)
            }
            Err(e) => {
                slot.status = QueryStatus::Error(e.to_string());
                Err(e)
            }
        }
    }
}
