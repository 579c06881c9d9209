//! Error types for the render host.

use hooktrace_registry::RegistryError;
use thiserror::Error;

/// Errors raised while rendering.
#[derive(Debug, Error)]
pub enum HostError {
    /// A traced call site was misused; the render pass was aborted.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A hook slot holds a different kind of hook than on an earlier render.
    #[error("Hook order changed in {component}: slot {index} holds a different hook")]
    HookOrderChanged {
        /// Component type name.
        component: String,
        /// Slot position.
        index: usize,
    },

    /// The host has no mounted root.
    #[error("No root element is mounted")]
    NotMounted,

    /// State kept changing after the allowed number of render passes.
    #[error("Render did not settle after {passes} passes")]
    RenderLimit {
        /// Passes rendered before giving up.
        passes: usize,
    },
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
