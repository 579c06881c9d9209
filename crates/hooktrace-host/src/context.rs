//! Render context.
//!
//! A [`RenderCx`] is handed to a component for one render pass. It exposes
//! the component's props, its hook slots, and the shared registry and
//! tracer the traced hook wrappers in [`crate::hooks`] build on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use hooktrace_core::Props;
use hooktrace_observe::{SharedTracer, Task};
use hooktrace_registry::{ComponentRegistry, SharedNode};

use crate::error::{HostError, HostResult};

/// A component body.
pub type ComponentFn = Arc<dyn Fn(&mut RenderCx<'_>) -> HostResult<Vec<Element>> + Send + Sync>;

/// Description of a component to render.
#[derive(Clone)]
pub struct Element {
    pub(crate) name: Arc<str>,
    pub(crate) render: ComponentFn,
    pub(crate) props: Props,
}

impl Element {
    /// Create an element for a component.
    pub fn new(
        name: impl Into<Arc<str>>,
        render: impl Fn(&mut RenderCx<'_>) -> HostResult<Vec<Element>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Arc::new(render),
            props: Props::new(),
        }
    }

    /// Set one prop.
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Replace all props.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Component type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Props of the element.
    pub fn props(&self) -> &Props {
        &self.props
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish()
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

/// Values provided to a subtree, by context.
pub(crate) type ContextMap = im::OrdMap<ContextId, Arc<dyn Any + Send + Sync>>;

/// A value passed down the tree without props.
///
/// Components below a [`RenderCx::provide`] call read the provided value
/// with `use_context`; everyone else reads the default.
#[derive(Clone)]
pub struct Context<T> {
    id: ContextId,
    default: T,
}

impl<T: Clone + Send + Sync + 'static> Context<T> {
    /// Create a context with a default value.
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            default,
        }
    }

    /// Context identifier.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Value seen outside any provider.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub(crate) fn read(&self, contexts: &ContextMap) -> T {
        contexts
            .get(&self.id)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("default", &self.default)
            .finish()
    }
}

/// Services shared by every component of a host.
#[derive(Clone)]
pub(crate) struct HostShared {
    pub(crate) registry: Arc<ComponentRegistry>,
    pub(crate) tracer: SharedTracer,
    pub(crate) dirty: Arc<AtomicBool>,
}

/// Work collected during a render pass and run at commit.
#[derive(Default)]
pub(crate) struct Commit {
    pub(crate) unmounts: Vec<Task>,
    pub(crate) insertion: Vec<Task>,
    pub(crate) layout: Vec<Task>,
    pub(crate) effects: Vec<Task>,
}

impl Commit {
    /// Run unmount callbacks, then insertion tasks, layout tasks and effects.
    pub(crate) fn run(self) -> usize {
        let count =
            self.unmounts.len() + self.insertion.len() + self.layout.len() + self.effects.len();
        for task in self
            .unmounts
            .into_iter()
            .chain(self.insertion)
            .chain(self.layout)
            .chain(self.effects)
        {
            task();
        }
        count
    }
}

/// Handle that schedules a re-render.
#[derive(Clone, Debug)]
pub struct Invalidate(Arc<AtomicBool>);

impl Invalidate {
    /// Mark the host as needing another render pass.
    pub fn invalidate(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Per-pass context of one component.
pub struct RenderCx<'a> {
    pub(crate) shared: &'a HostShared,
    pub(crate) node: &'a SharedNode,
    pub(crate) props: &'a Props,
    pub(crate) slots: &'a mut Vec<Box<dyn Any + Send>>,
    pub(crate) slot_index: usize,
    pub(crate) on_unmount: &'a mut Vec<Task>,
    pub(crate) commit: &'a mut Commit,
    pub(crate) contexts: &'a ContextMap,
    pub(crate) provided: &'a mut ContextMap,
}

impl RenderCx<'_> {
    /// Component type name.
    pub fn type_name(&self) -> &str {
        self.node.type_name()
    }

    /// Props of this render pass.
    pub fn props(&self) -> &Props {
        self.props
    }

    /// A single prop.
    pub fn prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.get(key)
    }

    /// The registry shared by the host.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.shared.registry
    }

    /// The tracer shared by the host.
    pub fn tracer(&self) -> &SharedTracer {
        &self.shared.tracer
    }

    /// Check if this component registered for tracing.
    pub fn is_traced(&self) -> bool {
        self.shared.registry.is_currently_traced()
    }

    /// Provide a context value to every component below this one.
    pub fn provide<T: Clone + Send + Sync + 'static>(&mut self, context: &Context<T>, value: T) {
        self.provided.insert(context.id, Arc::new(value));
    }

    /// Handle that schedules another render pass.
    pub fn invalidator(&self) -> Invalidate {
        Invalidate(Arc::clone(&self.shared.dirty))
    }

    /// Get the next hook slot, creating it on first render.
    ///
    /// Returns the slot value and whether it was just created.
    pub(crate) fn slot<S>(&mut self, init: impl FnOnce() -> S) -> HostResult<(S, bool)>
    where
        S: Any + Send + Clone,
    {
        let index = self.slot_index;
        self.slot_index += 1;

        if let Some(existing) = self.slots.get(index) {
            return existing
                .downcast_ref::<S>()
                .cloned()
                .map(|slot| (slot, false))
                .ok_or_else(|| HostError::HookOrderChanged {
                    component: self.node.type_name().to_string(),
                    index,
                });
        }

        let slot = init();
        self.slots.push(Box::new(slot.clone()));
        Ok((slot, true))
    }

    /// Run a task at commit, when an unmounted component is torn down.
    pub(crate) fn on_unmount(&mut self, task: impl FnOnce() + Send + 'static) {
        self.on_unmount.push(Box::new(task));
    }

    /// Run a task at commit, before layout tasks.
    pub(crate) fn schedule_insertion(&mut self, task: impl FnOnce() + Send + 'static) {
        self.commit.insertion.push(Box::new(task));
    }

    /// Run a task at commit, before effects.
    pub(crate) fn schedule_layout(&mut self, task: impl FnOnce() + Send + 'static) {
        self.commit.layout.push(Box::new(task));
    }

    /// Run a task at commit, after layout tasks.
    pub(crate) fn schedule_effect(&mut self, task: impl FnOnce() + Send + 'static) {
        self.commit.effects.push(Box::new(task));
    }
}

impl fmt::Debug for RenderCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCx")
            .field("node", self.node)
            .field("slot_index", &self.slot_index)
            .finish()
    }
}
