//! Component identities.
//!
//! A [`ComponentIdentity`] unifies every render node belonging to one logical
//! component instance. Its label (`Counter-2`) stays stable across render
//! passes, and it records the ordered call sites the component registers.

use std::fmt;
use std::sync::Arc;

use hooktrace_core::{OriginKind, SharedOrigin, TraceOrigin};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::{RegistryError, RegistryResult};

/// Shared handle to a component identity.
pub type SharedIdentity = Arc<ComponentIdentity>;

/// The four lifecycle origins every traced component owns.
#[derive(Debug, Clone)]
pub struct LifecycleOrigins {
    /// Mount events.
    pub mount: SharedOrigin,
    /// Render pass events, carrying props.
    pub render: SharedOrigin,
    /// Explicit trace calls from the component body.
    pub trace: SharedOrigin,
    /// Unmount events.
    pub unmount: SharedOrigin,
}

impl LifecycleOrigins {
    fn new() -> Self {
        Self {
            mount: TraceOrigin::shared(OriginKind::Mount, None),
            render: TraceOrigin::shared(OriginKind::Render, None),
            trace: TraceOrigin::shared(OriginKind::Trace, None),
            unmount: TraceOrigin::shared(OriginKind::Unmount, None),
        }
    }
}

#[derive(Debug, Default)]
struct CallSiteCursor {
    next_index: usize,
    call_sites: Vec<SharedOrigin>,
}

/// Durable record for one logical component instance.
#[derive(Debug)]
pub struct ComponentIdentity {
    name: Arc<str>,
    sequence_id: u32,
    label: Arc<str>,
    lifecycle: LifecycleOrigins,
    cursor: Mutex<CallSiteCursor>,
}

impl ComponentIdentity {
    pub(crate) fn new(name: impl Into<Arc<str>>, sequence_id: u32) -> Self {
        let name = name.into();
        let label: Arc<str> = format!("{name}-{sequence_id}").into();
        Self {
            name,
            sequence_id,
            label,
            lifecycle: LifecycleOrigins::new(),
            cursor: Mutex::new(CallSiteCursor::default()),
        }
    }

    /// Component type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based sequence number among components with the same name.
    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    /// Display label, `name-sequence_id`.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Shared label, for log entries.
    pub fn shared_label(&self) -> Arc<str> {
        Arc::clone(&self.label)
    }

    /// Lifecycle origins of this component.
    pub fn lifecycle(&self) -> &LifecycleOrigins {
        &self.lifecycle
    }

    /// Position the next registered call site will take.
    pub fn next_call_site_index(&self) -> usize {
        self.cursor.lock().next_index
    }

    /// All call sites registered so far, in order.
    pub fn call_sites(&self) -> Vec<SharedOrigin> {
        self.cursor.lock().call_sites.clone()
    }

    /// Call site at a position.
    pub fn call_site(&self, index: usize) -> Option<SharedOrigin> {
        self.cursor.lock().call_sites.get(index).cloned()
    }

    /// Origins in panel order: mount, render, call sites, trace.
    pub fn origin_list(&self) -> Vec<SharedOrigin> {
        let call_sites = self.call_sites();
        let mut origins = Vec::with_capacity(call_sites.len() + 3);
        origins.push(Arc::clone(&self.lifecycle.mount));
        origins.push(Arc::clone(&self.lifecycle.render));
        origins.extend(call_sites);
        origins.push(Arc::clone(&self.lifecycle.trace));
        origins
    }

    pub(crate) fn begin_pass(&self) {
        self.cursor.lock().next_index = 0;
    }

    pub(crate) fn register(
        &self,
        kind: OriginKind,
        label: Option<&str>,
    ) -> RegistryResult<SharedOrigin> {
        let mut cursor = self.cursor.lock();
        let index = cursor.next_index;

        let origin = match cursor.call_sites.get(index).cloned() {
            Some(existing) if existing.kind() != kind => {
                warn!(
                    component = %self.label,
                    index,
                    expected = %existing.kind(),
                    found = %kind,
                    "Call site order violation"
                );
                return Err(RegistryError::CallSiteOrderViolation {
                    component: self.label.to_string(),
                    index,
                    expected: existing.kind(),
                    found: kind,
                });
            }
            Some(existing) => existing,
            None => {
                let origin = TraceOrigin::shared(kind, label.map(str::to_string));
                cursor.call_sites.push(Arc::clone(&origin));
                trace!(component = %self.label, index, kind = %kind, "Call site registered");
                origin
            }
        };

        cursor.next_index += 1;
        Ok(origin)
    }
}

impl fmt::Display for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
