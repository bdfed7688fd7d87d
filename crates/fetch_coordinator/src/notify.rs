//! Delivery contexts for completion callbacks.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Boxed callback invocation handed to a [`NotifyContext`].
pub type NotifyTask = Box<dyn FnOnce() + Send + 'static>;

/// Where completion callbacks run.
///
/// Kept separate from [`RetrievalExecutor`](crate::RetrievalExecutor) so UI-bound callers can have
/// results marshaled onto their own thread while retrievals run elsewhere.
pub trait NotifyContext: Send + Sync {
    /// Schedules `task` on this context.
    fn dispatch(&self, task: NotifyTask);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Built-in notify contexts selectable from configuration.
pub enum NotifyTarget {
    /// [`ImmediateNotify`].
    #[default]
    Immediate,
    /// [`QueuedNotify`].
    Queued,
}

#[derive(Debug, Clone, Copy, Default)]
/// Runs callbacks on whichever thread resolved the request.
pub struct ImmediateNotify;

impl NotifyContext for ImmediateNotify {
    fn dispatch(&self, task: NotifyTask) {
        task();
    }
}

#[derive(Clone, Default)]
/// Collects callbacks until the designated context drains them with
/// [`run_pending`](Self::run_pending).
pub struct QueuedNotify {
    queue: Arc<Mutex<VecDeque<NotifyTask>>>,
}

impl QueuedNotify {
    /// Runs queued callbacks in arrival order on the calling thread and returns how many ran.
    ///
    /// The queue is swapped out before running, so callbacks dispatched by a running callback are
    /// picked up by the next drain rather than this one.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }

    /// Number of queued callbacks.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl NotifyContext for QueuedNotify {
    fn dispatch(&self, task: NotifyTask) {
        self.queue.lock().push_back(task);
    }
}

impl std::fmt::Debug for QueuedNotify {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedNotify")
            .field("pending", &self.pending())
            .finish()
    }
}
