//! Single-value pub/sub cells.
//!
//! An [`Observable`] delivers its current value synchronously to a new
//! subscriber, and every later change through the [`TaskQueue`]. Each change
//! schedules exactly one task carrying the value at call time, so deliveries
//! from one observable arrive in the order the changes were made.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::queue::TaskQueue;

/// Identifier returned by [`Observable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Get the raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ObservableInner<T> {
    name: &'static str,
    value: RwLock<T>,
    observers: RwLock<Vec<(SubscriptionId, Observer<T>)>>,
    next_id: AtomicU64,
    queue: TaskQueue,
}

impl<T> ObservableInner<T> {
    fn notify(&self, value: &T) {
        // Observers may subscribe or unsubscribe while being notified.
        let observers: Vec<Observer<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(value);
        }
    }
}

/// A value with subscribers and deferred change notification.
///
/// Values handed to subscribers are snapshots; subscribers never mutate them.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Create an observable with an initial value.
    pub fn new(name: &'static str, value: T, queue: TaskQueue) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                name,
                value: RwLock::new(value),
                observers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                queue,
            }),
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Add a subscriber.
    ///
    /// The subscriber is called with the current value before this returns.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let observer: Observer<T> = Arc::new(observer);
        self.inner
            .observers
            .write()
            .push((id, Arc::clone(&observer)));

        let current = self.value();
        observer(&current);
        id
    }

    /// Remove a subscriber. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.inner.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.observers.read().len()
    }

    /// Replace the value and schedule notification.
    pub fn set_value(&self, value: T) {
        *self.inner.value.write() = value.clone();
        self.schedule_notify(value);
    }

    /// Change the value in place and schedule notification.
    pub fn update<R>(&self, change: impl FnOnce(&mut T) -> R) -> R {
        let (result, value) = {
            let mut current = self.inner.value.write();
            let result = change(&mut current);
            (result, current.clone())
        };
        self.schedule_notify(value);
        result
    }

    /// Replace the value without notifying anyone.
    ///
    /// The caller is responsible for delivering the value, typically with
    /// [`Observable::notify`] from a task it schedules itself.
    pub(crate) fn store(&self, value: T) {
        *self.inner.value.write() = value;
    }

    /// Deliver a value to the current subscribers right now.
    pub(crate) fn notify(&self, value: &T) {
        self.inner.notify(value);
    }

    fn schedule_notify(&self, value: T) {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.schedule(move || inner.notify(&value));
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.inner.name)
            .field("subscribers", &self.inner.observers.read().len())
            .finish()
    }
}
