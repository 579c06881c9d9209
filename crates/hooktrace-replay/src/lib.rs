//! Hooktrace Replay
//!
//! This crate turns the tracer's append-only log into a navigable view:
//!
//! - [`ReplayMachine`]: Pure selection-cursor state machine
//! - [`ReplayEngine`]: The machine driven by the tracer's log and a tokio timer
//! - [`DelayPreference`]: The replay delay, kept in a host [`KeyValueStore`]
//!
//! # States
//!
//! ```text
//!            set_highlighted / step / stop_replay
//!   Idle ──────────────────────────────────────────▶ Paused
//!    │  log grows                                   │  ▲
//!    ▼                                 start_replay │  │ tick reaches last entry
//!   Replaying ◀─────────────────────────────────────┘  │
//!    └─────────────────────────────────────────────────┘
//! ```
//!
//! Clearing the log returns to `Idle` from any state.

pub mod delay;
pub mod engine;
pub mod machine;

// Re-export main types
pub use delay::{DelayPreference, KeyValueStore, MemoryStore, REPLAY_DELAY_KEY};
pub use engine::ReplayEngine;
pub use machine::{Direction, LogChange, ReplayMachine, ReplayState};
