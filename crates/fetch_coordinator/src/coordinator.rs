//! Fetch-once coordination.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use resource_cache::{
    CacheEntry, CacheKey, EvictionListener, NoopEvictionListener, ResourceCache,
};
use tracing::{debug, trace, warn};

use crate::{
    config::CoordinatorConfig,
    error::{CoordinatorConfigError, FetchError, RetrievalError},
    executor::{ExecutorKind, InlineExecutor, RetrievalExecutor, ThreadExecutor},
    in_flight::{InFlightRequest, InFlightTable},
    notify::{ImmediateNotify, NotifyContext, NotifyTarget, QueuedNotify},
    result::{FetchResult, ResourceState},
    stats::{FetchStats, FetchStatsSnapshot},
    subscription::{Completion, Settle, Subscription, WaiterSlot},
    validate::{default_key_rule, KeyValidator},
};

struct Shared {
    cache: ResourceCache,
    in_flight: InFlightTable,
    executor: Arc<dyn RetrievalExecutor>,
    notify: Arc<dyn NotifyContext>,
    notify_queue: Option<QueuedNotify>,
    validator: KeyValidator,
    stats: Arc<FetchStats>,
    next_waiter_id: AtomicU64,
}

/// Cache front end that retrieves each missing key at most once at a time.
///
/// Cloning is cheap and every clone shares the same cache and in-flight table, so one instance is
/// built at startup and handed to each collaborator.
///
/// For a key with no cached entry, the first request starts `retrieve(&key)` on the configured
/// [`RetrievalExecutor`]; requests arriving before it finishes join as waiters instead of
/// starting their own. On success the payload is cached and every waiter receives the same
/// [`CacheEntry`]; on failure every waiter receives the same error and nothing is cached, so the
/// next request retries.
#[derive(Clone)]
pub struct FetchCoordinator {
    shared: Arc<Shared>,
}

impl FetchCoordinator {
    /// Builds a coordinator from `config` with built-in executor and notify context.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorConfigError`] when `config` fails validation.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorConfigError> {
        Self::builder().config(config).build()
    }

    /// Starts a builder with default configuration.
    pub fn builder() -> FetchCoordinatorBuilder {
        FetchCoordinatorBuilder::default()
    }

    /// Returns the result for `key`, blocking the calling thread until it is available.
    ///
    /// `retrieve` runs only if this call starts the retrieval; otherwise it is dropped unused.
    pub fn request<F>(&self, key: impl Into<CacheKey>, retrieve: F) -> FetchResult
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError> + Send + 'static,
    {
        self.begin(key.into(), retrieve, None).wait()
    }

    /// Like [`request`](Self::request), but stops waiting after `timeout`.
    ///
    /// On timeout this waiter is withdrawn and receives [`FetchError::Cancelled`]; the retrieval
    /// keeps running for any other waiters and still populates the cache.
    pub fn request_timeout<F>(
        &self,
        key: impl Into<CacheKey>,
        retrieve: F,
        timeout: Duration,
    ) -> FetchResult
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError> + Send + 'static,
    {
        let subscription = self.begin(key.into(), retrieve, None);
        match subscription.wait_timeout(timeout) {
            Some(result) => result,
            None => {
                subscription.cancel();
                // Settled either by the cancel or by a retrieval that won the race.
                subscription.wait()
            }
        }
    }

    /// Starts or joins a request without blocking.
    pub fn subscribe<F>(&self, key: impl Into<CacheKey>, retrieve: F) -> Subscription
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError> + Send + 'static,
    {
        self.begin(key.into(), retrieve, None)
    }

    /// Starts or joins a request and runs `on_complete` with its result on the notify context.
    ///
    /// The callback runs exactly once, including for cache hits and invalid keys, unless the
    /// returned subscription is cancelled first. Every waiter is woken before any callback runs,
    /// and a panicking callback is caught and logged.
    pub fn request_with<F, C>(
        &self,
        key: impl Into<CacheKey>,
        retrieve: F,
        on_complete: C,
    ) -> Subscription
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError> + Send + 'static,
        C: FnOnce(FetchResult) + Send + 'static,
    {
        self.begin(key.into(), retrieve, Some(Box::new(on_complete)))
    }

    /// Reports what a presentation layer should show for `key` without starting anything.
    pub fn state(&self, key: &CacheKey) -> ResourceState {
        if let Some(entry) = self.shared.cache.peek(key) {
            return ResourceState::Loaded(entry);
        }
        if self.shared.in_flight.contains(key) {
            ResourceState::Loading
        } else {
            ResourceState::Absent
        }
    }

    /// Drops the cached entry for `key`. A retrieval already in flight is not affected and will
    /// cache its result when it completes.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.shared.cache.invalidate(key)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.shared.cache.clear();
    }

    /// Underlying cache.
    pub fn cache(&self) -> &ResourceCache {
        &self.shared.cache
    }

    /// Number of retrievals currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.shared.in_flight.len()
    }

    /// Queue to drain when built with [`NotifyTarget::Queued`].
    pub fn notify_queue(&self) -> Option<&QueuedNotify> {
        self.shared.notify_queue.as_ref()
    }

    /// Copy of the coordinator counters.
    pub fn stats(&self) -> FetchStatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn begin<F>(&self, key: CacheKey, retrieve: F, on_complete: Option<Completion>) -> Subscription
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError> + Send + 'static,
    {
        let shared = &self.shared;
        shared.stats.record_request();
        let slot = Arc::new(WaiterSlot::pending(on_complete));

        if let Err(reason) = (shared.validator)(&key) {
            shared.stats.record_invalid_key();
            debug!(key = %key, %reason, "rejected invalid key");
            let error = FetchError::InvalidKey {
                key: key.clone(),
                reason,
            };
            return self.settled(key, slot, FetchResult::Failure(error));
        }

        if let Some(entry) = shared.cache.get(&key) {
            shared.stats.record_cache_hit();
            return self.settled(key, slot, FetchResult::Success(entry));
        }

        let waiter_id = shared.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (flight, owner) = {
            let mut shard = shared.in_flight.shard(&key).lock();
            // A retrieval may have finished between the lookup above and taking the shard lock.
            if let Some(entry) = shared.cache.peek(&key) {
                drop(shard);
                shared.stats.record_cache_hit();
                return self.settled(key, slot, FetchResult::Success(entry));
            }
            match shard.get(&key) {
                Some(existing) => {
                    existing.join(waiter_id, Arc::clone(&slot));
                    (Arc::clone(existing), false)
                }
                None => {
                    let flight = InFlightRequest::new(key.clone());
                    flight.join(waiter_id, Arc::clone(&slot));
                    shard.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        let subscription = Subscription::new(
            key.clone(),
            slot,
            Some((Arc::downgrade(&flight), waiter_id)),
            Arc::clone(&shared.stats),
        );

        if owner {
            shared.stats.record_retrieval_started();
            debug!(key = %key, "starting retrieval");
            let worker = Arc::clone(shared);
            shared
                .executor
                .execute(Box::new(move || worker.run_retrieval(flight, retrieve)));
        } else {
            shared.stats.record_coalesced();
            trace!(key = %key, "joined retrieval in flight");
        }
        subscription
    }

    fn settled(&self, key: CacheKey, slot: Arc<WaiterSlot>, result: FetchResult) -> Subscription {
        self.shared.deliver(&key, &slot, result);
        Subscription::new(key, slot, None, Arc::clone(&self.shared.stats))
    }
}

impl Shared {
    fn run_retrieval<F>(&self, flight: Arc<InFlightRequest>, retrieve: F)
    where
        F: FnOnce(&CacheKey) -> Result<Vec<u8>, RetrievalError>,
    {
        let key = flight.key().clone();
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| retrieve(&key))).unwrap_or_else(|_| {
                warn!(key = %key, "retrieval panicked");
                Err(RetrievalError::new("retrieval panicked"))
            });

        let result = match outcome {
            Ok(bytes) => FetchResult::Success(CacheEntry::new(bytes)),
            Err(source) => {
                self.stats.record_retrieval_failure();
                warn!(key = %key, error = %source, "retrieval failed");
                FetchResult::Failure(FetchError::RetrievalFailed {
                    key: key.clone(),
                    source,
                })
            }
        };

        {
            let mut shard = self.in_flight.shard(&key).lock();
            if let FetchResult::Success(entry) = &result {
                self.cache.put(key.clone(), entry.clone());
            }
            if shard
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                shard.remove(&key);
            }
        }

        let waiters = flight.take_waiters();
        debug!(
            key = %key,
            ok = result.is_success(),
            waiters = waiters.len(),
            elapsed_ms = flight.elapsed().as_millis() as u64,
            "retrieval finished"
        );
        // Wake every waiter before any callback runs.
        let callbacks = waiters
            .iter()
            .filter_map(|waiter| match waiter.slot.settle(result.clone()) {
                Settle::Delivered(on_complete) => on_complete,
                Settle::AlreadySettled => None,
            })
            .collect::<Vec<_>>();
        for on_complete in callbacks {
            self.dispatch(&key, on_complete, result.clone());
        }
    }

    fn deliver(&self, key: &CacheKey, slot: &WaiterSlot, result: FetchResult) {
        if let Settle::Delivered(Some(on_complete)) = slot.settle(result.clone()) {
            self.dispatch(key, on_complete, result);
        }
    }

    fn dispatch(&self, key: &CacheKey, on_complete: Completion, result: FetchResult) {
        let key = key.clone();
        self.notify.dispatch(Box::new(move || {
            if panic::catch_unwind(AssertUnwindSafe(|| on_complete(result))).is_err() {
                warn!(key = %key, "completion callback panicked");
            }
        }));
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("cache", &self.shared.cache)
            .field("in_flight", &self.shared.in_flight.len())
            .field("shards", &self.shared.in_flight.shard_count())
            .finish()
    }
}

#[derive(Default)]
/// Assembles a [`FetchCoordinator`], optionally overriding the built-in collaborators.
pub struct FetchCoordinatorBuilder {
    config: CoordinatorConfig,
    executor: Option<Arc<dyn RetrievalExecutor>>,
    notify: Option<Arc<dyn NotifyContext>>,
    listener: Option<Arc<dyn EvictionListener>>,
    validator: Option<KeyValidator>,
}

impl FetchCoordinatorBuilder {
    /// Replaces the configuration.
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs retrievals on `executor` instead of the configured [`ExecutorKind`].
    pub fn executor(mut self, executor: Arc<dyn RetrievalExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Delivers callbacks on `notify` instead of the configured [`NotifyTarget`].
    pub fn notify_context(mut self, notify: Arc<dyn NotifyContext>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Reports cache removals to `listener`.
    pub fn eviction_listener(mut self, listener: Arc<dyn EvictionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replaces [`default_key_rule`].
    pub fn key_validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&CacheKey) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validates the configuration and builds the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorConfigError`] when the configuration fails validation.
    pub fn build(self) -> Result<FetchCoordinator, CoordinatorConfigError> {
        self.config.validate()?;
        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(NoopEvictionListener));
        let cache = ResourceCache::with_listener(self.config.cache.clone(), listener)?;

        let executor: Arc<dyn RetrievalExecutor> = match self.executor {
            Some(custom) => custom,
            None => match self.config.executor {
                ExecutorKind::Thread => Arc::new(ThreadExecutor::default()),
                ExecutorKind::Inline => Arc::new(InlineExecutor),
            },
        };

        let notify_queue = match (&self.notify, self.config.notify_context) {
            (None, NotifyTarget::Queued) => Some(QueuedNotify::default()),
            _ => None,
        };
        let notify: Arc<dyn NotifyContext> = match (self.notify, &notify_queue) {
            (Some(custom), _) => custom,
            (None, Some(queue)) => Arc::new(queue.clone()),
            (None, None) => Arc::new(ImmediateNotify),
        };
        let validator: KeyValidator = match self.validator {
            Some(custom) => custom,
            None => Arc::new(default_key_rule),
        };

        Ok(FetchCoordinator {
            shared: Arc::new(Shared {
                cache,
                in_flight: InFlightTable::new(self.config.shards),
                executor,
                notify,
                notify_queue,
                validator,
                stats: Arc::new(FetchStats::default()),
                next_waiter_id: AtomicU64::new(0),
            }),
        })
    }
}
