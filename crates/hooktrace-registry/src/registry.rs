//! The component identity registry.
//!
//! The registry maps ephemeral [`RenderNode`]s to durable
//! [`ComponentIdentity`] records. Associations are keyed by [`NodeId`] and
//! hold only a weak reference to the node, so the host can drop nodes freely;
//! dead associations are swept on allocation or by
//! [`ComponentRegistry::collect_garbage`].

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use hooktrace_core::{OriginKind, RegistryConfig, SharedOrigin};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::identity::{ComponentIdentity, SharedIdentity};
use crate::node::{NodeId, RenderNode, SharedNode};

struct Attachment {
    node: Weak<RenderNode>,
    identity: SharedIdentity,
}

/// Registry of component identities.
///
/// One registry is shared by every traced component of a host. The host
/// marks the node currently rendering with [`ComponentRegistry::enter`];
/// call-site operations act on that node.
///
/// # Example
///
/// ```
/// use hooktrace_core::OriginKind;
/// use hooktrace_registry::{ComponentRegistry, RenderNode};
///
/// let registry = ComponentRegistry::new();
/// let node = RenderNode::new("Counter");
///
/// let _scope = registry.enter(node.clone());
/// let identity = registry.begin_render_pass(&node);
/// let origin = registry.register_call_site(OriginKind::State, Some("count")).unwrap();
///
/// assert_eq!(identity.label(), "Counter-1");
/// assert_eq!(origin.kind(), OriginKind::State);
/// ```
pub struct ComponentRegistry {
    config: RegistryConfig,
    attachments: DashMap<NodeId, Attachment>,
    counters: DashMap<String, u32>,
    current: RwLock<Option<SharedNode>>,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Create a registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with the given configuration.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            attachments: DashMap::new(),
            counters: DashMap::new(),
            current: RwLock::new(None),
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the identity of a node, allocating one on first sight.
    ///
    /// A node without its own identity inherits the identity of its paired
    /// predecessor, and caches it so the chain is walked only once.
    pub fn resolve_identity(&self, node: &SharedNode) -> SharedIdentity {
        match self.lookup(node) {
            Some(identity) => identity,
            None => self.allocate(node),
        }
    }

    /// Look up the identity of a node without allocating one.
    pub fn identity_of(&self, node: &SharedNode) -> Option<SharedIdentity> {
        self.lookup(node)
    }

    /// Start a render pass for a node.
    ///
    /// Resolves the node's identity and rewinds its call-site cursor. Must run
    /// once per render invocation, before any call site registers.
    pub fn begin_render_pass(&self, node: &SharedNode) -> SharedIdentity {
        let identity = self.resolve_identity(node);
        identity.begin_pass();
        debug!(component = %identity.label(), node = %node.id(), "Render pass started");
        identity
    }

    /// Mark a node as the one currently rendering.
    ///
    /// The previous current node is restored when the returned scope drops.
    pub fn enter(&self, node: SharedNode) -> RenderScope<'_> {
        let previous = self.current.write().replace(node);
        RenderScope {
            registry: self,
            previous,
        }
    }

    /// The node currently rendering.
    pub fn current_node(&self) -> Option<SharedNode> {
        self.current.read().clone()
    }

    /// Register the next call site of the rendering component.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NoActiveRender`] outside a render scope.
    /// - [`RegistryError::CallSiteBeforeRegistration`] if the component has
    ///   not registered for tracing.
    /// - [`RegistryError::CallSiteOrderViolation`] if a different kind of call
    ///   site was registered at this position on an earlier render.
    pub fn register_call_site(
        &self,
        kind: OriginKind,
        label: Option<&str>,
    ) -> RegistryResult<SharedOrigin> {
        self.current_identity()?.register(kind, label)
    }

    /// Check if the rendering component registered for tracing.
    ///
    /// Returns false outside a render.
    pub fn is_currently_traced(&self) -> bool {
        self.current_node()
            .is_some_and(|node| self.lookup(&node).is_some())
    }

    /// Identity of the rendering component.
    pub fn current_identity(&self) -> RegistryResult<SharedIdentity> {
        let node = self.current_node().ok_or(RegistryError::NoActiveRender)?;
        self.lookup(&node)
            .ok_or_else(|| RegistryError::CallSiteBeforeRegistration {
                node_type: node.type_name().to_string(),
            })
    }

    /// Label of the rendering component.
    pub fn current_label(&self) -> RegistryResult<String> {
        Ok(self.current_identity()?.label().to_string())
    }

    /// Number of live node associations.
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Drop associations whose node is gone. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let before = self.attachments.len();
        self.attachments
            .retain(|_, attachment| attachment.node.strong_count() > 0);
        let removed = before.saturating_sub(self.attachments.len());
        if removed > 0 {
            debug!(removed, "Swept dead node associations");
        }
        removed
    }

    /// Clear every association and sequence counter.
    ///
    /// Intended for test isolation only.
    pub fn reset(&self) {
        self.attachments.clear();
        self.counters.clear();
        info!("Registry reset");
    }

    fn attached(&self, node: &RenderNode) -> Option<SharedIdentity> {
        self.attachments
            .get(&node.id())
            .map(|attachment| Arc::clone(&attachment.identity))
    }

    fn attach(&self, node: &SharedNode, identity: SharedIdentity) {
        self.attachments.insert(
            node.id(),
            Attachment {
                node: Arc::downgrade(node),
                identity,
            },
        );
    }

    fn lookup(&self, node: &SharedNode) -> Option<SharedIdentity> {
        if let Some(identity) = self.attached(node) {
            return Some(identity);
        }

        let predecessor = node.predecessor()?;
        let identity = self.attached(&predecessor)?;

        if self.config.split_on_type_change && identity.name() != node.type_name() {
            debug!(
                previous = %identity.label(),
                type_name = node.type_name(),
                "Component type changed, not inheriting identity"
            );
            return None;
        }

        self.attach(node, Arc::clone(&identity));
        Some(identity)
    }

    fn allocate(&self, node: &SharedNode) -> SharedIdentity {
        self.collect_garbage();

        let sequence_id = {
            let mut counter = self
                .counters
                .entry(node.type_name().to_string())
                .or_insert(0);
            *counter += 1;
            *counter
        };

        let identity = Arc::new(ComponentIdentity::new(node.type_name(), sequence_id));
        self.attach(node, Arc::clone(&identity));

        info!(component = %identity.label(), node = %node.id(), "Component identity allocated");
        identity
    }
}

/// Guard marking a node as currently rendering.
///
/// Dropping the guard restores the node that was current before.
pub struct RenderScope<'a> {
    registry: &'a ComponentRegistry,
    previous: Option<SharedNode>,
}

impl Drop for RenderScope<'_> {
    fn drop(&mut self) {
        *self.registry.current.write() = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(registry: &ComponentRegistry, node: &SharedNode, kinds: &[OriginKind]) -> RegistryResult<()> {
        let _scope = registry.enter(Arc::clone(node));
        registry.begin_render_pass(node);
        for kind in kinds {
            registry.register_call_site(*kind, None)?;
        }
        Ok(())
    }

    #[test]
    fn test_identity_stable_across_passes() {
        let registry = ComponentRegistry::new();
        let a = RenderNode::new("Counter");
        let b = RenderNode::with_predecessor("Counter", &a);

        let first = registry.resolve_identity(&a);
        let second = registry.resolve_identity(&b);

        // The alternate buffer swaps back and forth.
        a.set_predecessor(Some(&b));
        let third = registry.resolve_identity(&a);

        assert_eq!(first.label(), "Counter-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_predecessor_identity_is_cached() {
        let registry = ComponentRegistry::new();
        let a = RenderNode::new("Counter");
        let b = RenderNode::with_predecessor("Counter", &a);

        let identity = registry.resolve_identity(&a);
        registry.resolve_identity(&b);
        b.set_predecessor(None);

        let cached = registry.identity_of(&b).unwrap();
        assert!(Arc::ptr_eq(&identity, &cached));
    }

    #[test]
    fn test_sequence_disambiguation() {
        let registry = ComponentRegistry::new();
        let x1 = registry.resolve_identity(&RenderNode::new("X"));
        let x2 = registry.resolve_identity(&RenderNode::new("X"));
        let y1 = registry.resolve_identity(&RenderNode::new("Y"));

        assert_eq!(x1.label(), "X-1");
        assert_eq!(x2.label(), "X-2");
        assert_eq!(y1.label(), "Y-1");
    }

    #[test]
    fn test_call_site_order_enforcement() {
        let registry = ComponentRegistry::new();
        let a = RenderNode::new("Counter");
        let b = RenderNode::with_predecessor("Counter", &a);
        let c = RenderNode::with_predecessor("Counter", &b);

        render(&registry, &a, &[OriginKind::State, OriginKind::Effect]).unwrap();
        render(&registry, &b, &[OriginKind::State, OriginKind::Effect]).unwrap();

        let err = render(&registry, &c, &[OriginKind::Effect, OriginKind::State]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::CallSiteOrderViolation {
                index: 0,
                expected: OriginKind::State,
                found: OriginKind::Effect,
                ..
            }
        ));
    }

    #[test]
    fn test_call_site_outside_render() {
        let registry = ComponentRegistry::new();
        assert_eq!(
            registry.register_call_site(OriginKind::State, None).unwrap_err(),
            RegistryError::NoActiveRender
        );
        assert!(!registry.is_currently_traced());
        assert_eq!(registry.current_label().unwrap_err(), RegistryError::NoActiveRender);
    }

    #[test]
    fn test_call_site_before_registration() {
        let registry = ComponentRegistry::new();
        let node = RenderNode::new("Plain");
        let _scope = registry.enter(Arc::clone(&node));

        assert!(!registry.is_currently_traced());
        let err = registry.register_call_site(OriginKind::Ref, None).unwrap_err();
        assert_eq!(
            err,
            RegistryError::CallSiteBeforeRegistration {
                node_type: "Plain".to_string()
            }
        );
        assert_eq!(registry.attachment_count(), 0);
    }

    #[test]
    fn test_is_currently_traced_after_opt_in() {
        let registry = ComponentRegistry::new();
        let node = RenderNode::new("Counter");
        let _scope = registry.enter(Arc::clone(&node));

        registry.begin_render_pass(&node);
        assert!(registry.is_currently_traced());
        assert_eq!(registry.current_label().unwrap(), "Counter-1");
    }

    #[test]
    fn test_scopes_nest() {
        let registry = ComponentRegistry::new();
        let parent = RenderNode::new("Parent");
        let child = RenderNode::new("Child");

        let outer = registry.enter(Arc::clone(&parent));
        {
            let _inner = registry.enter(Arc::clone(&child));
            assert_eq!(registry.current_node().map(|n| n.id()), Some(child.id()));
        }
        assert_eq!(registry.current_node().map(|n| n.id()), Some(parent.id()));
        drop(outer);
        assert!(registry.current_node().is_none());
    }

    #[test]
    fn test_split_on_type_change() {
        let registry = ComponentRegistry::new();
        let a = RenderNode::new("Spinner");
        let b = RenderNode::with_predecessor("Content", &a);

        let old = registry.resolve_identity(&a);
        let new = registry.resolve_identity(&b);

        assert_eq!(old.label(), "Spinner-1");
        assert_eq!(new.label(), "Content-1");
    }

    #[test]
    fn test_inherit_on_type_change_when_disabled() {
        let registry =
            ComponentRegistry::with_config(RegistryConfig::new().with_split_on_type_change(false));
        let a = RenderNode::new("Spinner");
        let b = RenderNode::with_predecessor("Content", &a);

        let old = registry.resolve_identity(&a);
        let new = registry.resolve_identity(&b);

        assert!(Arc::ptr_eq(&old, &new));
    }

    #[test]
    fn test_dead_nodes_are_collected() {
        let registry = ComponentRegistry::new();
        let kept = RenderNode::new("Kept");
        registry.resolve_identity(&kept);
        registry.resolve_identity(&RenderNode::new("Dropped"));

        assert_eq!(registry.collect_garbage(), 1);
        assert_eq!(registry.attachment_count(), 1);
        assert!(registry.identity_of(&kept).is_some());
    }

    #[test]
    fn test_reset() {
        let registry = ComponentRegistry::new();
        let node = RenderNode::new("X");
        registry.resolve_identity(&node);
        registry.reset();

        assert!(registry.identity_of(&node).is_none());
        assert_eq!(registry.resolve_identity(&RenderNode::new("X")).label(), "X-1");
    }
}
