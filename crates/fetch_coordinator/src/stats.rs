//! Coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
/// Lock-free counters updated by [`FetchCoordinator`](crate::FetchCoordinator).
pub struct FetchStats {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    retrievals_started: AtomicU64,
    retrieval_failures: AtomicU64,
    cancellations: AtomicU64,
    invalid_keys: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Point-in-time copy of [`FetchStats`].
pub struct FetchStatsSnapshot {
    /// Every request, including hits and invalid keys.
    pub requests: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Requests that joined a retrieval already in flight.
    pub coalesced: u64,
    /// Retrieval functions invoked.
    pub retrievals_started: u64,
    /// Retrievals that returned an error or panicked.
    pub retrieval_failures: u64,
    /// Waiters that withdrew before resolution.
    pub cancellations: u64,
    /// Requests refused by the key validator.
    pub invalid_keys: u64,
}

impl FetchStats {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retrieval_started(&self) {
        self.retrievals_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retrieval_failure(&self) {
        self.retrieval_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_key(&self) {
        self.invalid_keys.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            retrievals_started: self.retrievals_started.load(Ordering::Relaxed),
            retrieval_failures: self.retrieval_failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            invalid_keys: self.invalid_keys.load(Ordering::Relaxed),
        }
    }
}
