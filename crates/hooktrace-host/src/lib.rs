//! Hooktrace Host
//!
//! A minimal component host used to drive the tracer the way a UI framework
//! would. It includes:
//!
//! - [`Host`]: Render/commit cycle over a tree of [`Element`]s
//! - [`RenderCx`]: Per-pass context handed to component bodies
//! - Traced call sites: `use_tracer`, `use_state`, `use_reducer`,
//!   `use_effect` (plus its layout and insertion variants), `use_ref`,
//!   `use_memo`, `use_callback` and `use_context`
//! - [`Context`]: Values provided to a subtree
//!
//! # Render Cycle
//!
//! Each instance alternates between two render nodes, so every pass renders
//! a node paired with the one from the previous pass. A pass renders the
//! whole tree, then runs unmount callbacks, insertion effects, layout work
//! and effects, then drains the tracer's task queue.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hooktrace_core::TracerConfig;
//! use hooktrace_host::{Element, Host};
//! use hooktrace_observe::{TaskQueue, Tracer};
//! use hooktrace_registry::ComponentRegistry;
//!
//! let tracer = Tracer::new(TracerConfig::default(), TaskQueue::new()).into_shared();
//! tracer.register_log_viewer();
//! let mut host = Host::new(Arc::new(ComponentRegistry::new()), tracer);
//!
//! host.mount(Element::new("Counter", |cx| {
//!     cx.use_tracer()?;
//!     let (count, _set_count) = cx.use_state(|| 0)?;
//!     assert_eq!(count, 0);
//!     Ok(vec![])
//! }))?;
//!
//! assert_eq!(host.traced_components()[0].label(), "Counter-1");
//! # Ok::<(), hooktrace_host::HostError>(())
//! ```

pub mod context;
pub mod error;
pub mod hooks;
pub mod host;

// Re-export main types
pub use context::{ComponentFn, Context, ContextId, Element, Invalidate, RenderCx};
pub use error::{HostError, HostResult};
pub use hooks::{
    Cleanup, Dispatch, HookOptions, Reducer, ReducerOptions, Show, ShowProp, StateSetter,
    TraceHandle, TracedCallback, TracedRef, TracerOptions,
};
pub use host::{DEFAULT_MAX_PASSES, Host};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::context::{Context, Element, RenderCx};
    pub use crate::error::{HostError, HostResult};
    pub use crate::hooks::{Cleanup, HookOptions, ReducerOptions, TracerOptions};
    pub use crate::host::Host;
}
