//! The render host.
//!
//! [`Host`] keeps a tree of component instances. Each instance owns two
//! render nodes and alternates between them across passes, pairing the new
//! node with the previous one as its predecessor. After every pass the
//! collected commit work runs and the task queue is drained, so deferred
//! notifications never run while a component body executes.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hooktrace_core::Props;
use hooktrace_observe::{SharedTracer, Task};
use hooktrace_registry::{ComponentRegistry, RenderNode, SharedIdentity, SharedNode};
use tracing::{debug, info, warn};

use crate::context::{Commit, ComponentFn, ContextMap, Element, HostShared, RenderCx};
use crate::error::{HostError, HostResult};

/// Default limit for [`Host::run_until_stable`].
pub const DEFAULT_MAX_PASSES: usize = 32;

/// One mounted component.
struct Instance {
    name: Arc<str>,
    render: ComponentFn,
    props: Props,
    node: Option<SharedNode>,
    alternate: Option<SharedNode>,
    slots: Vec<Box<dyn Any + Send>>,
    on_unmount: Vec<Task>,
    children: Vec<Instance>,
}

impl Instance {
    fn new(element: Element) -> Self {
        Self {
            name: element.name,
            render: element.render,
            props: element.props,
            node: None,
            alternate: None,
            slots: Vec::new(),
            on_unmount: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Swap in the node for the next pass.
    fn next_node(&mut self) -> SharedNode {
        let node = match (self.node.take(), self.alternate.take()) {
            (None, _) => RenderNode::new(Arc::clone(&self.name)),
            (Some(current), Some(alternate)) => {
                alternate.set_predecessor(Some(&current));
                self.alternate = Some(current);
                alternate
            }
            (Some(current), None) => {
                let next = RenderNode::with_predecessor(Arc::clone(&self.name), &current);
                self.alternate = Some(current);
                next
            }
        };
        self.node = Some(Arc::clone(&node));
        node
    }

    fn render(
        &mut self,
        shared: &HostShared,
        commit: &mut Commit,
        contexts: &ContextMap,
    ) -> HostResult<()> {
        let node = self.next_node();
        let render = Arc::clone(&self.render);
        let mut provided = contexts.clone();

        let elements = {
            let _scope = shared.registry.enter(Arc::clone(&node));
            let mut cx = RenderCx {
                shared,
                node: &node,
                props: &self.props,
                slots: &mut self.slots,
                slot_index: 0,
                on_unmount: &mut self.on_unmount,
                commit: &mut *commit,
                contexts,
                provided: &mut provided,
            };
            render(&mut cx)?
        };

        self.reconcile(elements, commit);
        for child in &mut self.children {
            child.render(shared, commit, &provided)?;
        }
        Ok(())
    }

    /// Match new elements to existing children by position and name.
    fn reconcile(&mut self, elements: Vec<Element>, commit: &mut Commit) {
        let mut previous: Vec<Option<Instance>> =
            std::mem::take(&mut self.children).into_iter().map(Some).collect();

        let children = elements
            .into_iter()
            .enumerate()
            .map(|(position, element)| {
                let kept = previous
                    .get_mut(position)
                    .and_then(|slot| slot.take_if(|child| child.name == element.name));
                match kept {
                    Some(mut child) => {
                        child.render = element.render;
                        child.props = element.props;
                        child
                    }
                    None => Instance::new(element),
                }
            })
            .collect();

        for stale in previous.into_iter().flatten() {
            stale.unmount_into(commit);
        }
        self.children = children;
    }

    fn unmount_into(self, commit: &mut Commit) {
        debug!(component = %self.name, "Unmounting component");
        commit.unmounts.extend(self.on_unmount);
        for child in self.children {
            child.unmount_into(commit);
        }
    }

    fn collect_identities(&self, registry: &ComponentRegistry, out: &mut Vec<SharedIdentity>) {
        if let Some(identity) = self.node.as_ref().and_then(|node| registry.identity_of(node)) {
            out.push(identity);
        }
        for child in &self.children {
            child.collect_identities(registry, out);
        }
    }
}

/// Minimal render host.
///
/// Renders a tree of [`Element`]s, runs commit work after each pass and
/// drains the tracer's task queue between passes.
pub struct Host {
    shared: HostShared,
    root: Option<Instance>,
    render_count: usize,
}

impl Host {
    /// Create a host rendering against the given registry and tracer.
    pub fn new(registry: Arc<ComponentRegistry>, tracer: SharedTracer) -> Self {
        Self {
            shared: HostShared {
                registry,
                tracer,
                dirty: Arc::new(AtomicBool::new(false)),
            },
            root: None,
            render_count: 0,
        }
    }

    /// The registry components resolve their identity in.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.shared.registry
    }

    /// The tracer components record to.
    pub fn tracer(&self) -> &SharedTracer {
        &self.shared.tracer
    }

    /// Number of render passes so far.
    pub fn render_count(&self) -> usize {
        self.render_count
    }

    /// Check if a state change is waiting for a render pass.
    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::SeqCst)
    }

    /// Check if a root is mounted.
    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    /// Mount a root element, replacing any current root, and render it.
    pub fn mount(&mut self, element: Element) -> HostResult<()> {
        let mut commit = Commit::default();
        if let Some(previous) = self.root.take() {
            previous.unmount_into(&mut commit);
        }
        info!(component = element.name(), "Mounting root");
        self.root = Some(Instance::new(element));
        self.render_pass(commit)
    }

    /// Replace the root's props and render.
    pub fn set_root_props(&mut self, props: Props) -> HostResult<()> {
        let root = self.root.as_mut().ok_or(HostError::NotMounted)?;
        root.props = props;
        self.render_pass(Commit::default())
    }

    /// Render if a state change is pending. Returns true if a pass ran.
    pub fn update(&mut self) -> HostResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.render_pass(Commit::default())?;
        Ok(true)
    }

    /// Render until no state change is pending.
    ///
    /// Returns the number of passes rendered.
    ///
    /// # Errors
    ///
    /// [`HostError::RenderLimit`] if state is still changing after
    /// `max_passes` passes.
    pub fn run_until_stable(&mut self, max_passes: usize) -> HostResult<usize> {
        let mut passes = 0;
        while self.is_dirty() {
            if passes == max_passes {
                return Err(HostError::RenderLimit { passes });
            }
            self.render_pass(Commit::default())?;
            passes += 1;
        }
        Ok(passes)
    }

    /// Unmount the root and everything below it.
    pub fn unmount(&mut self) -> HostResult<()> {
        let root = self.root.take().ok_or(HostError::NotMounted)?;
        info!(component = %root.name, "Unmounting root");

        let mut commit = Commit::default();
        root.unmount_into(&mut commit);
        commit.run();
        self.shared.tracer.queue().drain();
        self.shared.registry.collect_garbage();
        Ok(())
    }

    /// Identities of the mounted traced components, in tree order.
    pub fn traced_components(&self) -> Vec<SharedIdentity> {
        let mut identities = Vec::new();
        if let Some(root) = &self.root {
            root.collect_identities(&self.shared.registry, &mut identities);
        }
        identities
    }

    fn render_pass(&mut self, mut commit: Commit) -> HostResult<()> {
        let root = self.root.as_mut().ok_or(HostError::NotMounted)?;

        self.shared.dirty.store(false, Ordering::SeqCst);
        let outcome = root.render(&self.shared, &mut commit, &ContextMap::new());
        self.render_count += 1;

        match &outcome {
            Ok(()) => {
                let tasks = commit.run();
                debug!(pass = self.render_count, tasks, "Render pass committed");
            }
            Err(error) => {
                warn!(pass = self.render_count, error = %error, "Render pass aborted");
            }
        }

        let delivered = self.shared.tracer.queue().drain();
        debug!(delivered, "Task queue drained");
        outcome
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("mounted", &self.is_mounted())
            .field("render_count", &self.render_count)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hooktrace_core::{OriginKind, TracerConfig};
    use hooktrace_observe::{TaskQueue, Tracer};
    use hooktrace_registry::RegistryError;
    use parking_lot::Mutex;

    fn host() -> Host {
        let tracer = Tracer::new(TracerConfig::default(), TaskQueue::new()).into_shared();
        tracer.register_log_viewer();
        Host::new(Arc::new(ComponentRegistry::new()), tracer)
    }

    fn traced_leaf(name: &'static str) -> Element {
        Element::new(name, |cx| {
            cx.use_tracer()?;
            Ok(vec![])
        })
    }

    fn labels(host: &Host) -> Vec<String> {
        host.traced_components()
            .iter()
            .map(|identity| identity.label().to_string())
            .collect()
    }

    #[test]
    fn test_sibling_labels() {
        let mut host = host();
        host.mount(Element::new("App", |_| {
            Ok(vec![traced_leaf("Item"), traced_leaf("Item"), traced_leaf("Other")])
        }))
        .unwrap();

        assert_eq!(labels(&host), vec!["Item-1", "Item-2", "Other-1"]);
    }

    #[test]
    fn test_labels_stable_across_passes() {
        let mut host = host();
        host.mount(Element::new("App", |_| Ok(vec![traced_leaf("Item")])))
            .unwrap();

        for _ in 0..5 {
            host.set_root_props(Props::new()).unwrap();
        }

        assert_eq!(host.render_count(), 6);
        assert_eq!(labels(&host), vec!["Item-1"]);
    }

    #[test]
    fn test_nodes_alternate() {
        let mut host = host();
        host.mount(traced_leaf("Item")).unwrap();
        let first = host.root.as_ref().unwrap().node.clone().unwrap();

        host.set_root_props(Props::new()).unwrap();
        let second = host.root.as_ref().unwrap().node.clone().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.predecessor().unwrap().id(), first.id());

        host.set_root_props(Props::new()).unwrap();
        let third = host.root.as_ref().unwrap().node.clone().unwrap();
        assert_eq!(third.id(), first.id());
        assert_eq!(third.predecessor().unwrap().id(), second.id());
    }

    #[test]
    fn test_removed_child_unmounts() {
        let mut host = host();
        host.mount(
            Element::new("App", |cx| {
                let show = cx.prop("show").and_then(|v| v.as_bool()).unwrap_or(false);
                Ok(if show { vec![traced_leaf("Panel")] } else { vec![] })
            })
            .with_prop("show", true),
        )
        .unwrap();
        assert!(host.tracer().is_label_traced("Panel-1"));

        host.set_root_props(Props::from([("show".to_string(), false.into())]))
            .unwrap();
        assert!(!host.tracer().is_label_traced("Panel-1"));

        let last = host.tracer().log_entries().last().cloned().unwrap();
        assert_eq!(last.origin().kind(), OriginKind::Unmount);

        host.set_root_props(Props::from([("show".to_string(), true.into())]))
            .unwrap();
        assert_eq!(labels(&host), vec!["Panel-2"]);
    }

    #[test]
    fn test_swapped_component_gets_new_identity() {
        let mut host = host();
        host.mount(
            Element::new("App", |cx| {
                let first = cx.prop("first").and_then(|v| v.as_bool()).unwrap_or(true);
                Ok(vec![if first { traced_leaf("A") } else { traced_leaf("B") }])
            })
            .with_prop("first", true),
        )
        .unwrap();

        host.set_root_props(Props::from([("first".to_string(), false.into())]))
            .unwrap();
        assert_eq!(labels(&host), vec!["B-1"]);
    }

    #[test]
    fn test_call_site_order_violation_aborts_render() {
        let mut host = host();
        host.mount(
            Element::new("Flaky", |cx| {
                cx.use_tracer()?;
                if cx.prop("swap").and_then(|v| v.as_bool()).unwrap_or(false) {
                    cx.use_effect((), || None)?;
                    cx.use_state(|| 0)?;
                } else {
                    cx.use_state(|| 0)?;
                    cx.use_effect((), || None)?;
                }
                Ok(vec![])
            })
            .with_prop("swap", false),
        )
        .unwrap();

        host.set_root_props(Props::from([("swap".to_string(), false.into())]))
            .unwrap();

        let error = host
            .set_root_props(Props::from([("swap".to_string(), true.into())]))
            .unwrap_err();
        assert!(matches!(
            error,
            HostError::Registry(RegistryError::CallSiteOrderViolation { index: 0, .. })
        ));
    }

    #[test]
    fn test_run_until_stable() {
        let mut host = host();
        host.mount(Element::new("Countdown", |cx| {
            cx.use_tracer()?;
            let (n, set_n) = cx.use_state(|| 3_u32)?;
            if n > 0 {
                set_n.set(n - 1);
            }
            Ok(vec![])
        }))
        .unwrap();

        assert_eq!(host.run_until_stable(DEFAULT_MAX_PASSES).unwrap(), 3);
        assert!(!host.is_dirty());
    }

    #[test]
    fn test_render_limit() {
        let mut host = host();
        host.mount(Element::new("Spinner", |cx| {
            cx.invalidator().invalidate();
            Ok(vec![])
        }))
        .unwrap();

        assert!(matches!(
            host.run_until_stable(4),
            Err(HostError::RenderLimit { passes: 4 })
        ));
    }

    #[test]
    fn test_commit_order() {
        let mut host = host();
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        host.tracer().subscribe_log_entries(move |log| {
            if let Some(entry) = log.last() {
                seen.lock().push(entry.phase());
            }
        });
        order.lock().clear();

        host.mount(traced_leaf("Leaf")).unwrap();

        let phases: Vec<_> = host
            .tracer()
            .log_entries()
            .iter()
            .map(|entry| entry.phase())
            .collect();
        assert_eq!(
            phases,
            vec![
                Some(hooktrace_core::Phase::Mounting),
                Some(hooktrace_core::Phase::Props),
                Some(hooktrace_core::Phase::Mounted),
            ]
        );
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn test_not_mounted() {
        let mut host = host();
        assert!(matches!(host.unmount(), Err(HostError::NotMounted)));
        assert!(matches!(
            host.set_root_props(Props::new()),
            Err(HostError::NotMounted)
        ));
        assert!(!host.update().unwrap());
    }

    #[test]
    fn test_unmount_releases_nodes() {
        let mut host = host();
        host.mount(Element::new("App", |_| Ok(vec![traced_leaf("Item")])))
            .unwrap();
        host.set_root_props(Props::new()).unwrap();
        assert!(host.registry().attachment_count() > 0);

        host.unmount().unwrap();
        assert_eq!(host.registry().attachment_count(), 0);
    }
}
