//! Render nodes.
//!
//! A [`RenderNode`] is the host framework's ephemeral record for one
//! component invocation. The host owns every node; the registry only holds
//! weak references to them, keyed by [`NodeId`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a render node.
///
/// Allocated from a process-wide counter and never reused, so two nodes with
/// equal contents still have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw identifier value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Shared handle to a render node.
pub type SharedNode = Arc<RenderNode>;

/// One component invocation in a render pass.
pub struct RenderNode {
    id: NodeId,
    type_name: Arc<str>,
    predecessor: RwLock<Option<Weak<RenderNode>>>,
}

impl RenderNode {
    /// Create a node with no predecessor.
    pub fn new(type_name: impl Into<Arc<str>>) -> SharedNode {
        Arc::new(Self {
            id: NodeId::next(),
            type_name: type_name.into(),
            predecessor: RwLock::new(None),
        })
    }

    /// Create a node paired with the node of the previous pass.
    pub fn with_predecessor(type_name: impl Into<Arc<str>>, predecessor: &SharedNode) -> SharedNode {
        let node = Self::new(type_name);
        node.set_predecessor(Some(predecessor));
        node
    }

    /// Get the node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the component type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get the paired predecessor, if it is still alive.
    pub fn predecessor(&self) -> Option<SharedNode> {
        self.predecessor.read().as_ref().and_then(Weak::upgrade)
    }

    /// Replace the paired predecessor.
    pub fn set_predecessor(&self, predecessor: Option<&SharedNode>) {
        *self.predecessor.write() = predecessor.map(Arc::downgrade);
    }
}

impl fmt::Debug for RenderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderNode")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field(
                "predecessor",
                &self.predecessor().map(|node| node.id()),
            )
            .finish()
    }
}
