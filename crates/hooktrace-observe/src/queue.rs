//! Deferred task queue.
//!
//! Observable notifications never run inside a render pass. They are queued
//! here and run when the host drains the queue between passes. Tasks run in
//! the order they were scheduled.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// A deferred, zero-argument continuation.
pub type Task = Box<dyn FnOnce() + Send>;

struct QueueInner {
    sender: mpsc::UnboundedSender<Task>,
    receiver: Mutex<mpsc::UnboundedReceiver<Task>>,
    pending: AtomicUsize,
}

/// Single-consumer FIFO of deferred tasks.
///
/// Cloning the queue yields another handle to the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                sender,
                receiver: Mutex::new(receiver),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    /// Schedule a task to run at the next drain.
    pub fn schedule(&self, task: impl FnOnce() + Send + 'static) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if self.inner.sender.send(Box::new(task)).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Task queue closed, dropping task");
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Check if no task is waiting.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Run queued tasks until the queue is empty.
    ///
    /// Tasks scheduled by a running task run in the same drain, after the
    /// tasks already queued. A drain called from inside a task returns
    /// immediately. Returns the number of tasks run.
    pub fn drain(&self) -> usize {
        let Some(mut receiver) = self.inner.receiver.try_lock() else {
            return 0;
        };

        let mut ran = 0;
        while let Ok(task) = receiver.try_recv() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            task();
            ran += 1;
        }

        if ran > 0 {
            trace!(tasks = ran, "Task queue drained");
        }
        ran
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}
