//! Trace origins.
//!
//! A [`TraceOrigin`] is the durable record for one call site (or one
//! lifecycle event) of a traced component. Log entries point to their origin
//! by reference, and the wrapper that owns the call site updates the origin's
//! display text in place whenever the value it tracks changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The kind of event source a trace origin represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginKind {
    /// Component mount.
    Mount,
    /// Component render pass.
    Render,
    /// Component unmount.
    Unmount,
    /// Explicit trace call from the component body.
    Trace,
    /// State call site.
    State,
    /// Effect call site.
    Effect,
    /// Layout effect call site.
    LayoutEffect,
    /// Insertion effect call site.
    InsertionEffect,
    /// Memoized value call site.
    Memo,
    /// Memoized callback call site.
    Callback,
    /// Context read call site.
    Context,
    /// Reducer call site.
    Reducer,
    /// Mutable reference call site.
    Ref,
}

impl OriginKind {
    /// Get the short name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginKind::Mount => "mount",
            OriginKind::Render => "render",
            OriginKind::Unmount => "unmount",
            OriginKind::Trace => "trace",
            OriginKind::State => "state",
            OriginKind::Effect => "effect",
            OriginKind::LayoutEffect => "layout-effect",
            OriginKind::InsertionEffect => "insertion-effect",
            OriginKind::Memo => "memo",
            OriginKind::Callback => "callback",
            OriginKind::Context => "context",
            OriginKind::Reducer => "reducer",
            OriginKind::Ref => "ref",
        }
    }

    /// Check if this kind is a component lifecycle event rather than a call site.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            OriginKind::Mount | OriginKind::Render | OriginKind::Unmount | OriginKind::Trace
        )
    }
}

impl std::fmt::Display for OriginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_ORIGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a trace origin.
///
/// Origins are compared by this identifier, never by their contents: two
/// `state` call sites with the same label are still different origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginId(u64);

impl OriginId {
    fn next() -> Self {
        Self(NEXT_ORIGIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OriginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a trace origin.
pub type SharedOrigin = Arc<TraceOrigin>;

/// The durable record a log entry points to.
///
/// Kind and label are fixed at creation. The display text has a single
/// writer (the wrapper owning the call site); readers take a snapshot.
#[derive(Debug)]
pub struct TraceOrigin {
    id: OriginId,
    kind: OriginKind,
    label: Option<String>,
    display: RwLock<Option<Arc<str>>>,
}

impl TraceOrigin {
    /// Create a new trace origin.
    pub fn new(kind: OriginKind, label: Option<String>) -> Self {
        Self {
            id: OriginId::next(),
            kind,
            label,
            display: RwLock::new(None),
        }
    }

    /// Create a new shared trace origin.
    pub fn shared(kind: OriginKind, label: Option<String>) -> SharedOrigin {
        Arc::new(Self::new(kind, label))
    }

    /// Get the origin identifier.
    pub fn id(&self) -> OriginId {
        self.id
    }

    /// Get the origin kind.
    pub fn kind(&self) -> OriginKind {
        self.kind
    }

    /// Get the optional label given at the call site.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Snapshot of the current display text.
    pub fn display(&self) -> Option<Arc<str>> {
        self.display.read().clone()
    }

    /// Replace the display text.
    pub fn set_display(&self, display: impl Into<Arc<str>>) {
        *self.display.write() = Some(display.into());
    }

    /// Remove the display text.
    pub fn clear_display(&self) {
        *self.display.write() = None;
    }

    /// Render the origin the way a component panel lists it,
    /// e.g. `state«count»:3`, `effect`, `ref:null`.
    pub fn describe(&self) -> String {
        let display = self.display();
        let mut out = String::from(self.kind.as_str());
        if let Some(label) = &self.label {
            out.push('«');
            out.push_str(label);
            out.push('»');
        }
        if let Some(display) = display {
            out.push(':');
            out.push_str(&display);
        }
        out
    }
}
