//! Log entries and their payloads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::format;
use crate::origin::{SharedOrigin, TraceOrigin};

/// Phase of the traced event within its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Call site initialized on first render.
    Init,
    /// Value replaced directly.
    Set,
    /// Value replaced through an update function.
    Update,
    /// Effect body ran.
    Run,
    /// Memoized value recomputed after a dependency change.
    Refresh,
    /// Effect cleanup ran.
    Cleanup,
    /// Component is mounting.
    Mounting,
    /// Component finished mounting.
    Mounted,
    /// Render pass with the given props.
    Props,
    /// Action sent to a reducer.
    Dispatch,
    /// State produced by a reducer.
    State,
}

impl Phase {
    /// Get the short name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Set => "set",
            Phase::Update => "update",
            Phase::Run => "run",
            Phase::Refresh => "refresh",
            Phase::Cleanup => "cleanup",
            Phase::Mounting => "mounting",
            Phase::Mounted => "mounted",
            Phase::Props => "props",
            Phase::Dispatch => "dispatch",
            Phase::State => "state",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A traced value that knows how to render itself.
pub trait TracedValue: fmt::Debug + Send + Sync {
    /// Render the value for display.
    fn show(&self) -> String;
}

struct Shown<T, F> {
    value: T,
    show: F,
}

impl<T: fmt::Debug, F> fmt::Debug for Shown<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T, F> TracedValue for Shown<T, F>
where
    T: fmt::Debug + Send + Sync,
    F: Fn(&T) -> String + Send + Sync,
{
    fn show(&self) -> String {
        (self.show)(&self.value)
    }
}

/// A value paired with its formatter, rendered lazily.
#[derive(Clone)]
pub struct ValuePayload(Arc<dyn TracedValue>);

impl ValuePayload {
    /// Pair a value with a custom formatter.
    pub fn new<T, F>(value: T, show: F) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(Shown { value, show }))
    }

    /// Pair a value with the default JSON formatter.
    pub fn json<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(value, |v| format::show_json(v))
    }

    /// Render the value.
    pub fn show(&self) -> String {
        self.0.show()
    }
}

impl fmt::Debug for ValuePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValuePayload").field(&self.0).finish()
    }
}

/// Payload carried by a log entry.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// No payload.
    #[default]
    Empty,
    /// A plain message.
    Message(String),
    /// A value with its formatter.
    Value(ValuePayload),
}

impl Payload {
    /// Create a message payload.
    pub fn message(message: impl Into<String>) -> Self {
        Payload::Message(message.into())
    }

    /// Create a value payload with a custom formatter.
    pub fn value<T, F>(value: T, show: F) -> Self
    where
        T: fmt::Debug + Send + Sync + 'static,
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Payload::Value(ValuePayload::new(value, show))
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Render the payload, or `None` when empty.
    pub fn show(&self) -> Option<String> {
        match self {
            Payload::Empty => None,
            Payload::Message(message) => Some(message.clone()),
            Payload::Value(value) => Some(value.show()),
        }
    }
}

impl From<&str> for Payload {
    fn from(message: &str) -> Self {
        Payload::Message(message.to_string())
    }
}

impl From<String> for Payload {
    fn from(message: String) -> Self {
        Payload::Message(message)
    }
}

impl From<ValuePayload> for Payload {
    fn from(value: ValuePayload) -> Self {
        Payload::Value(value)
    }
}

/// One immutable entry of the trace log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    component_label: Arc<str>,
    origin: SharedOrigin,
    phase: Option<Phase>,
    payload: Payload,
}

impl LogEntry {
    /// Create a new log entry.
    pub fn new(
        component_label: impl Into<Arc<str>>,
        origin: SharedOrigin,
        phase: Option<Phase>,
        payload: Payload,
    ) -> Self {
        Self {
            component_label: component_label.into(),
            origin,
            phase,
            payload,
        }
    }

    /// Label of the component that produced the entry.
    pub fn component_label(&self) -> &str {
        &self.component_label
    }

    /// The origin the entry points to.
    pub fn origin(&self) -> &SharedOrigin {
        &self.origin
    }

    /// Check if the entry was produced by the given origin.
    pub fn is_from(&self, origin: &TraceOrigin) -> bool {
        self.origin.id() == origin.id()
    }

    /// The phase, if any.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// The payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// The log as delivered to subscribers.
///
/// A persistent vector, so snapshots are cheap to clone and appending never
/// touches a snapshot a subscriber already holds.
pub type LogEntries = im::Vector<LogEntry>;

/// The currently selected entry together with its index.
#[derive(Debug, Clone)]
pub struct SelectedEntry {
    /// Index into the log.
    pub index: usize,
    /// The entry at that index.
    pub entry: LogEntry,
}
