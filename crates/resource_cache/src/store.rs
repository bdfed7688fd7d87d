//! Bounded in-memory store.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    config::{CacheConfig, EvictionPolicy},
    entry::CacheEntry,
    error::ConfigError,
    key::CacheKey,
    listener::{EvictionListener, EvictionReason, NoopEvictionListener},
    stats::{CacheStats, CacheStatsSnapshot},
};

struct CacheState {
    // Unbounded: bounds are enforced by `put`, not by the `lru` capacity.
    entries: LruCache<CacheKey, CacheEntry>,
    total_bytes: usize,
}

type Removed = Vec<(CacheKey, CacheEntry, EvictionReason)>;

/// Thread-safe key→payload map bounded by [`CacheConfig`].
///
/// Every operation takes one short mutex; none performs I/O. Eviction order is kept by an
/// `lru::LruCache`: under [`EvictionPolicy::Lru`] reads promote the entry, under
/// [`EvictionPolicy::Fifo`] they do not, so the tail is always the next victim.
pub struct ResourceCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
    listener: Arc<dyn EvictionListener>,
}

impl ResourceCache {
    /// Creates an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails [`CacheConfig::validate`].
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        Self::with_listener(config, Arc::new(NoopEvictionListener))
    }

    /// Creates an empty cache that reports removals to `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails [`CacheConfig::validate`].
    pub fn with_listener(
        config: CacheConfig,
        listener: Arc<dyn EvictionListener>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
            config,
            stats: Arc::new(CacheStats::default()),
            listener,
        })
    }

    /// Looks up `key`, refreshing its recency under LRU.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let found = {
            let mut state = self.state.lock();
            match self.config.eviction_policy {
                EvictionPolicy::Lru => state.entries.get(key).cloned(),
                EvictionPolicy::Fifo => state.entries.peek(key).cloned(),
            }
        };
        if found.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        found
    }

    /// Looks up `key` without touching recency or hit counters.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().entries.peek(key).cloned()
    }

    /// Returns `true` when `key` has an entry.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Inserts or replaces the entry for `key`, evicting as needed to stay within bounds.
    ///
    /// An entry larger than `max_total_bytes` is refused; any previous entry for `key` is still
    /// removed so the cache never serves data older than the latest `put`.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        let mut removed = Removed::new();
        {
            let mut state = self.state.lock();
            if let Some(previous) = state.entries.pop(&key) {
                state.total_bytes = state.total_bytes.saturating_sub(previous.len());
                removed.push((key.clone(), previous, EvictionReason::Replaced));
            }

            if self.admits(&entry) {
                while self.exceeds_bounds(&state, entry.len()) {
                    let Some((victim_key, victim)) = state.entries.pop_lru() else {
                        break;
                    };
                    state.total_bytes = state.total_bytes.saturating_sub(victim.len());
                    self.stats.record_eviction();
                    removed.push((victim_key, victim, EvictionReason::Capacity));
                }
                state.total_bytes += entry.len();
                state.entries.put(key, entry);
                self.stats.record_insertion();
            } else {
                self.stats.record_rejection();
                removed.push((key, entry, EvictionReason::Rejected));
            }

            self.stats.set_occupancy(state.entries.len(), state.total_bytes);
        }
        self.report(removed);
    }

    /// Removes the entry for `key`. Absent keys are a no-op.
    ///
    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.entries.pop(key);
            if let Some(entry) = &previous {
                state.total_bytes = state.total_bytes.saturating_sub(entry.len());
            }
            self.stats.set_occupancy(state.entries.len(), state.total_bytes);
            previous
        };
        match previous {
            Some(entry) => {
                self.report(vec![(key.clone(), entry, EvictionReason::Invalidated)]);
                true
            }
            None => false,
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let removed: Removed = {
            let mut state = self.state.lock();
            let mut drained = Removed::with_capacity(state.entries.len());
            while let Some((key, entry)) = state.entries.pop_lru() {
                drained.push((key, entry, EvictionReason::Cleared));
            }
            state.total_bytes = 0;
            self.stats.set_occupancy(0, 0);
            drained
        };
        self.report(removed);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Sum of cached payload sizes.
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    /// Cached keys, next eviction victim last.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Copy of the current counters.
    pub fn stats_snapshot(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    fn admits(&self, entry: &CacheEntry) -> bool {
        self.config
            .max_total_bytes
            .map_or(true, |max| entry.len() <= max)
    }

    fn exceeds_bounds(&self, state: &CacheState, incoming_len: usize) -> bool {
        let over_count = self
            .config
            .max_entries
            .is_some_and(|max| state.entries.len() + 1 > max);
        let over_bytes = self
            .config
            .max_total_bytes
            .is_some_and(|max| state.total_bytes + incoming_len > max);
        over_count || over_bytes
    }

    fn report(&self, removed: Removed) {
        for (key, entry, reason) in removed {
            match reason {
                EvictionReason::Capacity => {
                    debug!(key = %key, bytes = entry.len(), "evicted cache entry")
                }
                EvictionReason::Rejected => {
                    debug!(
                        key = %key,
                        bytes = entry.len(),
                        "entry exceeds max-total-bytes, not cached"
                    )
                }
                _ => {}
            }
            self.listener.on_removed(&key, &entry, reason);
        }
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourceCache")
            .field("config", &self.config)
            .field("len", &state.entries.len())
            .field("total_bytes", &state.total_bytes)
            .finish()
    }
}
