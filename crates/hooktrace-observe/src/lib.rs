//! Hooktrace Observe
//!
//! This crate provides the event store of the hooktrace tracer:
//!
//! - [`TaskQueue`]: Deferred FIFO of tasks, drained between render passes
//! - [`Observable`]: Single-value pub/sub cell with deferred notification
//! - [`Tracer`]: The trace log, selected entry and traced-label set
//! - [`TraceSink`]: Console mirroring destinations
//!
//! # Deferred Notification
//!
//! A subscriber reacting to a change must never run while the host is in the
//! middle of a render pass. Every change schedules a task on the
//! [`TaskQueue`]; the host drains the queue between passes.
//!
//! ```
//! use hooktrace_core::{OriginKind, Payload, TraceOrigin, TracerConfig};
//! use hooktrace_observe::{TaskQueue, Tracer};
//!
//! let queue = TaskQueue::new();
//! let tracer = Tracer::new(TracerConfig::default(), queue.clone());
//! tracer.subscribe_log_entries(|log| println!("{} entries", log.len()));
//!
//! let origin = TraceOrigin::shared(OriginKind::State, None);
//! tracer.trace("Counter-1", &origin, None, Payload::from("1"));
//!
//! // Subscribers see the new entry only now.
//! queue.drain();
//! ```

pub mod observable;
pub mod queue;
pub mod sink;
pub mod tracer;

// Re-export main types
pub use observable::{Observable, SubscriptionId};
pub use queue::{Task, TaskQueue};
pub use sink::{CollectingSink, LoggingSink, StderrSink, TraceSink};
pub use tracer::{SharedTracer, TracedLabels, Tracer, TracerId};
