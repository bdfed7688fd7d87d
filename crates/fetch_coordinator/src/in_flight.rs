//! Per-key in-flight retrieval records, sharded by key hash.

use std::{
    collections::HashMap,
    hash::BuildHasher,
    sync::Arc,
    time::{Duration, Instant},
};

use ahash::RandomState;
use parking_lot::Mutex;
use resource_cache::CacheKey;

use crate::subscription::WaiterSlot;

pub(crate) struct Waiter {
    id: u64,
    pub(crate) slot: Arc<WaiterSlot>,
}

/// One retrieval underway for a key, plus the waiters to settle when it finishes.
///
/// Waiters join only while the record is registered in its shard and the shard lock is held, so
/// once the record is removed from the shard the waiter list is final.
pub(crate) struct InFlightRequest {
    key: CacheKey,
    started_at: Instant,
    waiters: Mutex<Vec<Waiter>>,
}

impl InFlightRequest {
    pub(crate) fn new(key: CacheKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            started_at: Instant::now(),
            waiters: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn join(&self, id: u64, slot: Arc<WaiterSlot>) {
        self.waiters.lock().push(Waiter { id, slot });
    }

    /// Drops waiter `id` and returns how many waiters remain.
    pub(crate) fn withdraw(&self, id: u64) -> usize {
        let mut waiters = self.waiters.lock();
        waiters.retain(|waiter| waiter.id != id);
        waiters.len()
    }

    pub(crate) fn take_waiters(&self) -> Vec<Waiter> {
        std::mem::take(&mut *self.waiters.lock())
    }
}

type Shard = Mutex<HashMap<CacheKey, Arc<InFlightRequest>>>;

/// Key-hashed shards of in-flight records. Requests for different keys usually land on different
/// shard locks; requests for the same key always share one.
pub(crate) struct InFlightTable {
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl InFlightTable {
    pub(crate) fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    pub(crate) fn shard(&self, key: &CacheKey) -> &Shard {
        let index = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.shard(key).lock().contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub(crate) fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_always_maps_to_same_shard() {
        let table = InFlightTable::new(8);
        let key = CacheKey::from("thumb/42.png");
        let first = table.shard(&key) as *const Shard;
        for _ in 0..16 {
            assert_eq!(table.shard(&key) as *const Shard, first);
        }
    }

    #[test]
    fn zero_shards_is_clamped_to_one() {
        assert_eq!(InFlightTable::new(0).shard_count(), 1);
    }

    #[test]
    fn withdraw_reports_remaining_waiters() {
        let request = InFlightRequest::new(CacheKey::from("k"));
        request.join(1, Arc::new(WaiterSlot::pending(None)));
        request.join(2, Arc::new(WaiterSlot::pending(None)));

        assert_eq!(request.withdraw(1), 1);
        assert_eq!(request.withdraw(1), 1);
        assert_eq!(request.withdraw(2), 0);
        assert!(request.take_waiters().is_empty());
    }
}
