//! Execution contexts for retrievals.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Boxed retrieval job handed to a [`RetrievalExecutor`].
pub type RetrievalTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs retrievals away from the coordinator's bookkeeping.
///
/// The coordinator calls [`execute`](Self::execute) after releasing its locks, once per retrieval.
/// A task must eventually run exactly once; waiters block until it does.
pub trait RetrievalExecutor: Send + Sync {
    /// Schedules `task`.
    fn execute(&self, task: RetrievalTask);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Built-in executors selectable from configuration.
pub enum ExecutorKind {
    /// [`ThreadExecutor`].
    #[default]
    Thread,
    /// [`InlineExecutor`].
    Inline,
}

#[derive(Debug, Clone, Copy, Default)]
/// Runs the retrieval on the requesting thread before `request`/`subscribe` returns.
///
/// Concurrent requests for the same key still coalesce: only the first caller runs the task.
pub struct InlineExecutor;

impl RetrievalExecutor for InlineExecutor {
    fn execute(&self, task: RetrievalTask) {
        task();
    }
}

#[derive(Debug, Clone)]
/// Runs every retrieval on its own named background thread.
///
/// One OS thread exists per key in flight, with no upper limit; joined requests and cache hits
/// spawn nothing. Hosts that can start many distinct retrievals at once (a scrolling thumbnail
/// grid, say) should supply a pooled [`RetrievalExecutor`] through
/// [`FetchCoordinatorBuilder::executor`](crate::FetchCoordinatorBuilder::executor) instead.
pub struct ThreadExecutor {
    name_prefix: Arc<str>,
    spawned: Arc<AtomicU64>,
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("resource-fetch")
    }
}

impl ThreadExecutor {
    /// Creates an executor whose threads are named `{name_prefix}-{n}`.
    pub fn new(name_prefix: impl AsRef<str>) -> Self {
        Self {
            name_prefix: Arc::from(name_prefix.as_ref()),
            spawned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of threads spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl RetrievalExecutor for ThreadExecutor {
    fn execute(&self, task: RetrievalTask) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{n}", self.name_prefix);

        // `Builder::spawn` consumes the closure even when it fails, so park the task where the
        // fallback path can still reach it.
        let slot = Arc::new(Mutex::new(Some(task)));
        let worker_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            if let Some(task) = worker_slot.lock().take() {
                task();
            }
        });
        if let Err(err) = spawned {
            warn!(thread = %name, error = %err, "failed to spawn retrieval thread, running inline");
            if let Some(task) = slot.lock().take() {
                task();
            }
        }
    }
}

#[derive(Clone, Default)]
/// Queues retrievals until the owning context calls [`run_pending`](Self::run_pending).
///
/// Fits single-threaded cooperative hosts: a frame loop subscribes, then drains the queue at a
/// point of its choosing. Blocking `request` calls on the draining thread would never return, so
/// such hosts use `subscribe`/`request_with` instead.
pub struct DeferredExecutor {
    queue: Arc<Mutex<VecDeque<RetrievalTask>>>,
}

impl DeferredExecutor {
    /// Runs every queued retrieval in submission order and returns how many ran.
    ///
    /// Retrievals queued while draining wait for the next call.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    /// Number of queued retrievals.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl RetrievalExecutor for DeferredExecutor {
    fn execute(&self, task: RetrievalTask) {
        self.queue.lock().push_back(task);
    }
}

impl std::fmt::Debug for DeferredExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredExecutor")
            .field("pending", &self.pending())
            .finish()
    }
}
