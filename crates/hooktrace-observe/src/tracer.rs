//! The tracer.
//!
//! The [`Tracer`] is the event sink every traced call site writes to. It owns
//! three observables (the log, the selected entry, and the set of traced
//! component labels) and the console mirroring policy.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hooktrace_core::{
    LogEntries, LogEntry, Payload, Phase, SelectedEntry, SharedOrigin, TracerConfig,
};
use parking_lot::RwLock;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::observable::{Observable, SubscriptionId};
use crate::queue::TaskQueue;
use crate::sink::{StderrSink, TraceSink};

/// Unique identifier for a tracer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TracerId(Uuid);

impl TracerId {
    /// Generate a new random tracer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TracerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TracerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Labels of the traced components currently mounted.
pub type TracedLabels = im::OrdSet<Arc<str>>;

/// Shared handle to a tracer.
pub type SharedTracer = Arc<Tracer>;

/// The process-wide trace log.
///
/// All operations are infallible. Log and selection changes reach
/// subscribers through the task queue; console mirroring is synchronous.
pub struct Tracer {
    id: TracerId,
    config: RwLock<TracerConfig>,
    queue: TaskQueue,
    log: Observable<LogEntries>,
    selected: Observable<Option<SelectedEntry>>,
    labels: Observable<TracedLabels>,
    sink: RwLock<Arc<dyn TraceSink>>,
    has_viewer: AtomicBool,
}

impl Tracer {
    /// Create a tracer that mirrors to stderr.
    pub fn new(config: TracerConfig, queue: TaskQueue) -> Self {
        Self::with_sink(config, queue, Arc::new(StderrSink))
    }

    /// Create a tracer with a custom mirroring sink.
    pub fn with_sink(config: TracerConfig, queue: TaskQueue, sink: Arc<dyn TraceSink>) -> Self {
        let id = TracerId::new();
        debug!(tracer = %id, enabled = config.enabled, "Tracer created");
        Self {
            id,
            config: RwLock::new(config),
            log: Observable::new("log-entries", LogEntries::new(), queue.clone()),
            selected: Observable::new("selected-entry", None, queue.clone()),
            labels: Observable::new("traced-labels", TracedLabels::new(), queue.clone()),
            queue,
            sink: RwLock::new(sink),
            has_viewer: AtomicBool::new(false),
        }
    }

    /// Wrap the tracer in an `Arc`.
    pub fn into_shared(self) -> SharedTracer {
        Arc::new(self)
    }

    /// Get the tracer ID.
    pub fn id(&self) -> TracerId {
        self.id
    }

    /// Get the queue notifications are delivered through.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Snapshot of the configuration.
    pub fn config(&self) -> TracerConfig {
        self.config.read().clone()
    }

    /// Check if tracing is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    /// Turn console mirroring on or off.
    pub fn set_mirror_to_console(&self, mirror: bool) {
        self.config.write().mirror_to_console = mirror;
    }

    /// Replace the mirroring sink.
    pub fn set_sink(&self, sink: Arc<dyn TraceSink>) {
        *self.sink.write() = sink;
    }

    /// Append an entry to the log.
    pub fn trace(
        &self,
        component_label: impl Into<Arc<str>>,
        origin: &SharedOrigin,
        phase: Option<Phase>,
        payload: Payload,
    ) {
        let config = self.config();
        if !config.enabled {
            return;
        }

        let entry = LogEntry::new(component_label, Arc::clone(origin), phase, payload);
        let index = self.log.update(|log| {
            log.push_back(entry.clone());
            log.len() - 1
        });

        trace!(
            index,
            component = entry.component_label(),
            origin = %origin.kind(),
            "Entry recorded"
        );

        if config.mirror_to_console {
            self.sink.read().emit(index, &entry);
        }
    }

    /// Snapshot of the log.
    pub fn log_entries(&self) -> LogEntries {
        self.log.value()
    }

    /// Number of entries in the log.
    pub fn len(&self) -> usize {
        self.log.value().len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the entry at `index` in the current log, or clear the selection.
    ///
    /// An index past the end of the log clears the selection.
    pub fn select_entry(&self, index: Option<usize>) {
        let selected = index.and_then(|index| {
            self.log
                .value()
                .get(index)
                .cloned()
                .map(|entry| SelectedEntry { index, entry })
        });
        self.selected.set_value(selected);
    }

    /// Snapshot of the selected entry.
    pub fn selected_entry(&self) -> Option<SelectedEntry> {
        self.selected.value()
    }

    /// Empty the log and clear the selection.
    ///
    /// Both changes are delivered in one task, selection first, so no
    /// subscriber sees an empty log next to a stale selection.
    pub fn clear_log(&self) {
        self.selected.store(None);
        self.log.store(LogEntries::new());

        let selected = self.selected.clone();
        let log = self.log.clone();
        self.queue.schedule(move || {
            selected.notify(&None);
            log.notify(&LogEntries::new());
        });

        info!(tracer = %self.id, "Trace log cleared");
    }

    /// Mark a traced component label as mounted.
    pub fn register_label(&self, label: impl Into<Arc<str>>) {
        let label = label.into();
        self.labels.update(|labels| {
            labels.insert(label);
        });
    }

    /// Mark a traced component label as unmounted.
    pub fn unregister_label(&self, label: &str) {
        self.labels.update(|labels| {
            labels.remove(label);
        });
    }

    /// Snapshot of the mounted traced labels.
    pub fn traced_labels(&self) -> TracedLabels {
        self.labels.value()
    }

    /// Check if a traced component with this label is mounted.
    pub fn is_label_traced(&self, label: &str) -> bool {
        self.labels.value().contains(label)
    }

    /// Subscribe to the log.
    pub fn subscribe_log_entries(
        &self,
        observer: impl Fn(&LogEntries) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.log.subscribe(observer)
    }

    /// Unsubscribe from the log.
    pub fn unsubscribe_log_entries(&self, id: SubscriptionId) -> bool {
        self.log.unsubscribe(id)
    }

    /// Subscribe to the selected entry.
    pub fn subscribe_selected_entry(
        &self,
        observer: impl Fn(&Option<SelectedEntry>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.selected.subscribe(observer)
    }

    /// Unsubscribe from the selected entry.
    pub fn unsubscribe_selected_entry(&self, id: SubscriptionId) -> bool {
        self.selected.unsubscribe(id)
    }

    /// Subscribe to the mounted traced labels.
    pub fn subscribe_traced_labels(
        &self,
        observer: impl Fn(&TracedLabels) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.labels.subscribe(observer)
    }

    /// Unsubscribe from the mounted traced labels.
    pub fn unsubscribe_traced_labels(&self, id: SubscriptionId) -> bool {
        self.labels.unsubscribe(id)
    }

    /// Record that a log viewer is displaying the log.
    pub fn register_log_viewer(&self) {
        self.has_viewer.store(true, Ordering::SeqCst);
        debug!(tracer = %self.id, "Log viewer registered");
    }

    /// Record that the log viewer went away.
    pub fn unregister_log_viewer(&self) {
        self.has_viewer.store(false, Ordering::SeqCst);
        debug!(tracer = %self.id, "Log viewer unregistered");
    }

    /// Check if a log viewer is registered.
    pub fn has_log_viewer(&self) -> bool {
        self.has_viewer.load(Ordering::SeqCst)
    }

    /// Make sure trace output is visible somewhere.
    ///
    /// Without a log viewer, the entries recorded so far are written to the
    /// sink and console mirroring is turned on for later ones. Returns true
    /// if the fallback was taken.
    pub fn ensure_output(&self) -> bool {
        if self.has_log_viewer() || !self.is_enabled() {
            return false;
        }

        let mut config = self.config.write();
        if config.mirror_to_console {
            return false;
        }
        config.mirror_to_console = true;
        drop(config);

        let log = self.log.value();
        let sink = self.sink.read().clone();
        for (index, entry) in log.iter().enumerate() {
            sink.emit(index, entry);
        }

        info!(
            tracer = %self.id,
            flushed = log.len(),
            "No log viewer registered, mirroring trace to console"
        );
        true
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("id", &self.id)
            .field("config", &self.config())
            .field("entries", &self.len())
            .finish()
    }
}
