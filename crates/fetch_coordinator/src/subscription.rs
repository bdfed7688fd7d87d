//! Waiter slots and the caller-facing subscription handle.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use resource_cache::CacheKey;
use tracing::debug;

use crate::{
    error::FetchError,
    in_flight::InFlightRequest,
    result::{FetchResult, ResourceState},
    stats::FetchStats,
};

/// Completion callback registered through `request_with`.
pub(crate) type Completion = Box<dyn FnOnce(FetchResult) + Send + 'static>;

enum SlotState {
    Pending {
        on_complete: Option<Completion>,
        waker: Option<Waker>,
    },
    Settled(FetchResult),
}

/// Outcome of trying to settle a slot.
pub(crate) enum Settle {
    /// This call settled the slot; the callback (if any) still has to be dispatched.
    Delivered(Option<Completion>),
    /// The slot was already settled, typically by a cancellation.
    AlreadySettled,
}

/// One waiter's view of a retrieval. Settles exactly once.
pub(crate) struct WaiterSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl WaiterSlot {
    pub(crate) fn pending(on_complete: Option<Completion>) -> Self {
        Self {
            state: Mutex::new(SlotState::Pending {
                on_complete,
                waker: None,
            }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn settle(&self, result: FetchResult) -> Settle {
        let (on_complete, waker) = {
            let mut state = self.state.lock();
            let SlotState::Pending { on_complete, waker } = &mut *state else {
                return Settle::AlreadySettled;
            };
            let taken = (on_complete.take(), waker.take());
            *state = SlotState::Settled(result);
            taken
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        Settle::Delivered(on_complete)
    }

    pub(crate) fn current(&self) -> Option<FetchResult> {
        match &*self.state.lock() {
            SlotState::Pending { .. } => None,
            SlotState::Settled(result) => Some(result.clone()),
        }
    }

    pub(crate) fn wait(&self) -> FetchResult {
        let mut state = self.state.lock();
        loop {
            if let SlotState::Settled(result) = &*state {
                return result.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<FetchResult> {
        let mut state = self.state.lock();
        loop {
            if let SlotState::Settled(result) = &*state {
                return Some(result.clone());
            }
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    SlotState::Settled(result) => Some(result.clone()),
                    SlotState::Pending { .. } => None,
                };
            }
        }
    }

    fn poll(&self, cx: &mut Context<'_>) -> Poll<FetchResult> {
        let mut state = self.state.lock();
        match &mut *state {
            SlotState::Settled(result) => Poll::Ready(result.clone()),
            SlotState::Pending { waker, .. } => {
                let stale = waker
                    .as_ref()
                    .map_or(true, |registered| !registered.will_wake(cx.waker()));
                if stale {
                    *waker = Some(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

/// Handle to one caller's pending or completed request.
///
/// Yields `Loading → Loaded | Failed` through [`state`](Self::state), blocks through
/// [`wait`](Self::wait), and can be `.await`ed on any executor. Dropping the handle does not
/// cancel anything; a registered callback still runs.
pub struct Subscription {
    key: CacheKey,
    slot: Arc<WaiterSlot>,
    flight: Option<(Weak<InFlightRequest>, u64)>,
    stats: Arc<FetchStats>,
}

impl Subscription {
    pub(crate) fn new(
        key: CacheKey,
        slot: Arc<WaiterSlot>,
        flight: Option<(Weak<InFlightRequest>, u64)>,
        stats: Arc<FetchStats>,
    ) -> Self {
        Self {
            key,
            slot,
            flight,
            stats,
        }
    }

    /// Requested key.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Current state: [`ResourceState::Loading`] until resolved, then loaded or failed.
    pub fn state(&self) -> ResourceState {
        match self.slot.current() {
            Some(result) => result.into(),
            None => ResourceState::Loading,
        }
    }

    /// Returns the result if already resolved.
    pub fn try_result(&self) -> Option<FetchResult> {
        self.slot.current()
    }

    /// Returns `true` once resolved or cancelled.
    pub fn is_finished(&self) -> bool {
        self.slot.current().is_some()
    }

    /// Blocks until resolved.
    pub fn wait(&self) -> FetchResult {
        self.slot.wait()
    }

    /// Blocks for at most `timeout`. Returns `None` if still pending; the wait stays registered.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<FetchResult> {
        self.slot.wait_until(Instant::now() + timeout)
    }

    /// Withdraws this waiter.
    ///
    /// The waiter resolves to [`FetchError::Cancelled`] and its callback is dropped unrun. Other
    /// waiters and the retrieval itself are unaffected; a retrieval left with no waiters still
    /// completes and populates the cache. Returns `false` if the request had already resolved.
    pub fn cancel(&self) -> bool {
        let cancelled = FetchResult::Failure(FetchError::Cancelled {
            key: self.key.clone(),
        });
        if let Settle::AlreadySettled = self.slot.settle(cancelled) {
            return false;
        }
        self.stats.record_cancellation();
        if let Some((flight, waiter_id)) = &self.flight {
            if let Some(flight) = flight.upgrade() {
                if flight.withdraw(*waiter_id) == 0 {
                    debug!(key = %self.key, "last waiter withdrew, retrieval continues unobserved");
                }
            }
        }
        true
    }
}

impl Future for Subscription {
    type Output = FetchResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.slot.poll(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}
