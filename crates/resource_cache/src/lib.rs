//! In-memory resource cache for opaque byte payloads.
//!
//! This crate is the leaf of the fetch stack. It knows nothing about networks or retrieval: it
//! maps a [`CacheKey`] to an immutable [`CacheEntry`] and keeps the map inside the bounds set by
//! [`CacheConfig`]. Removal happens only through eviction, replacement, explicit invalidation, or
//! [`ResourceCache::clear`]; every removal is reported to the configured [`EvictionListener`].

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod listener;
pub mod stats;
pub mod store;

pub use config::{CacheConfig, EvictionPolicy, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_BYTES};
pub use entry::CacheEntry;
pub use error::ConfigError;
pub use key::CacheKey;
pub use listener::{
    EvictionEvent, EvictionListener, EvictionReason, MemoryEvictionListener, NoopEvictionListener,
};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use store::ResourceCache;
