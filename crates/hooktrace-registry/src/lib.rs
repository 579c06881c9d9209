//! Hooktrace Registry - Component Identity Registry
//!
//! This crate assigns stable, human-readable identities to the ephemeral
//! render nodes a host framework produces on every render pass, and enforces
//! a deterministic order of stateful call sites within each component.
//!
//! # Identity Model
//!
//! - A node's identity is inherited from its paired predecessor, so a
//!   component keeps its label (`Counter-1`) across render passes
//! - Labels are disambiguated by a per-name counter, first come first served
//! - The registry never owns nodes; associations are weak and keyed by
//!   [`NodeId`], never by value
//!
//! # Call-Site Order
//!
//! Each render pass rewinds the component's cursor. Every call site registers
//! at the next position; a kind that differs from the one recorded on an
//! earlier render is a [`RegistryError::CallSiteOrderViolation`].
//!
//! # Usage
//!
//! ```
//! use hooktrace_core::OriginKind;
//! use hooktrace_registry::{ComponentRegistry, RenderNode};
//!
//! let registry = ComponentRegistry::new();
//! let first = RenderNode::new("Counter");
//! let second = RenderNode::with_predecessor("Counter", &first);
//!
//! for node in [&first, &second] {
//!     let _scope = registry.enter(node.clone());
//!     registry.begin_render_pass(node);
//!     registry.register_call_site(OriginKind::State, None).unwrap();
//! }
//!
//! assert_eq!(registry.resolve_identity(&second).label(), "Counter-1");
//! ```

pub mod error;
pub mod identity;
pub mod node;
pub mod registry;

// Re-export main types
pub use error::{RegistryError, RegistryResult};
pub use identity::{ComponentIdentity, LifecycleOrigins, SharedIdentity};
pub use node::{NodeId, RenderNode, SharedNode};
pub use registry::{ComponentRegistry, RenderScope};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{RegistryError, RegistryResult};
    pub use crate::identity::{ComponentIdentity, SharedIdentity};
    pub use crate::node::{RenderNode, SharedNode};
    pub use crate::registry::ComponentRegistry;
}
