//! Deduplicated retrieval in front of a [`ResourceCache`](resource_cache::ResourceCache).
//!
//! [`FetchCoordinator`] answers requests for remote resources by key. Cached keys resolve
//! immediately. A missing key triggers exactly one caller-supplied retrieval no matter how many
//! requests arrive while it runs; every waiter receives the same outcome. Successful payloads are
//! cached, failures are not.
//!
//! Retrievals run on a [`RetrievalExecutor`] and completion callbacks on a [`NotifyContext`], so
//! hosts with a single UI thread can keep both network work and result delivery where they
//! belong. [`CoordinatorConfig`] selects the built-in variants and the cache bounds.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
mod in_flight;
pub mod notify;
pub mod result;
pub mod stats;
pub mod subscription;
pub mod validate;

pub use config::{CoordinatorConfig, DEFAULT_SHARDS};
pub use coordinator::{FetchCoordinator, FetchCoordinatorBuilder};
pub use error::{CoordinatorConfigError, FetchError, FetchErrorKind, RetrievalError};
pub use executor::{
    DeferredExecutor, ExecutorKind, InlineExecutor, RetrievalExecutor, RetrievalTask,
    ThreadExecutor,
};
pub use notify::{ImmediateNotify, NotifyContext, NotifyTarget, NotifyTask, QueuedNotify};
pub use resource_cache::{
    CacheConfig, CacheEntry, CacheKey, EvictionListener, EvictionPolicy, EvictionReason,
    MemoryEvictionListener,
};
pub use result::{FetchResult, ResourceState};
pub use stats::{FetchStats, FetchStatsSnapshot};
pub use subscription::Subscription;
pub use validate::{default_key_rule, KeyValidator};
