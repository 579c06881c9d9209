//! Error types for the component identity registry.

use hooktrace_core::OriginKind;
use thiserror::Error;

/// Errors raised by misuse of the registry.
///
/// These are programming errors in the traced component, not tracer
/// failures. The host aborts the render of the offending component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A registry operation that needs a current node ran outside a render.
    #[error("No component is currently rendering")]
    NoActiveRender,

    /// A traced call site ran before its component registered for tracing.
    #[error("Traced call site used in {node_type} before the component registered for tracing")]
    CallSiteBeforeRegistration {
        /// Type name of the rendering node.
        node_type: String,
    },

    /// Call sites were registered in a different order than on a previous render.
    #[error(
        "Call site order changed in {component}: position {index} was {expected}, now {found}"
    )]
    CallSiteOrderViolation {
        /// Label of the component.
        component: String,
        /// Position of the mismatching call site.
        index: usize,
        /// Kind registered at this position on an earlier render.
        expected: OriginKind,
        /// Kind requested on this render.
        found: OriginKind,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
