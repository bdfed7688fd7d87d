//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
/// Lock-free counters updated by [`ResourceCache`](crate::ResourceCache).
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    rejections: AtomicU64,
    entry_count: AtomicU64,
    total_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Point-in-time copy of [`CacheStats`].
pub struct CacheStatsSnapshot {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries admitted by `put`.
    pub insertions: u64,
    /// Entries removed to satisfy a bound.
    pub evictions: u64,
    /// Entries refused for exceeding `max_total_bytes` alone.
    pub rejections: u64,
    /// Entries currently cached.
    pub entry_count: u64,
    /// Bytes currently cached.
    pub total_bytes: u64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_occupancy(&self, entry_count: usize, total_bytes: usize) {
        self.entry_count.store(entry_count as u64, Ordering::Relaxed);
        self.total_bytes.store(total_bytes as u64, Ordering::Relaxed);
    }

    /// Lookups that found an entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries removed to satisfy a bound.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit ratio in `0.0..=1.0`, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions(),
            rejections: self.rejections.load(Ordering::Relaxed),
            entry_count: self.entry_count.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
        }
    }
}
