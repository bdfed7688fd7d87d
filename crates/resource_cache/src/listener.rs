//! Removal notifications for cache observers.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::{entry::CacheEntry, key::CacheKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
/// Why an entry left the cache (or never entered it).
pub enum EvictionReason {
    /// Removed to make room under `max_entries` or `max_total_bytes`.
    Capacity,
    /// Superseded by a newer `put` for the same key.
    Replaced,
    /// Larger than `max_total_bytes` on its own; never admitted.
    Rejected,
    /// Removed by [`ResourceCache::invalidate`](crate::ResourceCache::invalidate).
    Invalidated,
    /// Removed by [`ResourceCache::clear`](crate::ResourceCache::clear).
    Cleared,
}

/// Observer for entries leaving a [`ResourceCache`](crate::ResourceCache).
///
/// Called after the cache's internal lock is released, once per removed entry. Implementations
/// run on the thread that triggered the removal and must not block; a fetch coordinator may still
/// hold its own per-key lock while a `put` it issued reports evictions, so listeners must not call
/// back into the coordinator.
pub trait EvictionListener: Send + Sync {
    /// Reports that `entry` stored under `key` was removed for `reason`.
    fn on_removed(&self, key: &CacheKey, entry: &CacheEntry, reason: EvictionReason);
}

#[derive(Debug, Clone, Copy, Default)]
/// Listener that ignores every notification.
pub struct NoopEvictionListener;

impl EvictionListener for NoopEvictionListener {
    fn on_removed(&self, _key: &CacheKey, _entry: &CacheEntry, _reason: EvictionReason) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One recorded removal.
pub struct EvictionEvent {
    /// Key of the removed entry.
    pub key: CacheKey,
    /// Payload size of the removed entry.
    pub len: usize,
    /// Removal cause.
    pub reason: EvictionReason,
}

#[derive(Debug, Clone, Default)]
/// Listener that records removals in memory, in the order they were reported.
pub struct MemoryEvictionListener {
    events: Arc<Mutex<Vec<EvictionEvent>>>,
}

impl MemoryEvictionListener {
    /// Returns a copy of the recorded events.
    pub fn events(&self) -> Vec<EvictionEvent> {
        self.events.lock().clone()
    }

    /// Returns and forgets the recorded events.
    pub fn take(&self) -> Vec<EvictionEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Keys removed for `reason`, oldest first.
    pub fn keys_for(&self, reason: EvictionReason) -> Vec<CacheKey> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.reason == reason)
            .map(|event| event.key.clone())
            .collect()
    }
}

impl EvictionListener for MemoryEvictionListener {
    fn on_removed(&self, key: &CacheKey, entry: &CacheEntry, reason: EvictionReason) {
        self.events.lock().push(EvictionEvent {
            key: key.clone(),
            len: entry.len(),
            reason,
        });
    }
}
