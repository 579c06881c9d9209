//! Hooktrace Core - Shared Trace Data Model
//!
//! This crate provides the data model shared by every hooktrace crate:
//!
//! - [`TraceOrigin`]: The durable record for one call site or lifecycle event
//! - [`LogEntry`]: One immutable entry of the trace log
//! - [`Payload`]: Message or lazily formatted value carried by an entry
//! - Formatting helpers for values, props and log lines
//! - Configuration types for the tracer, registry and replay engine
//!
//! # Quick Start
//!
//! ```
//! use hooktrace_core::prelude::*;
//!
//! let origin = TraceOrigin::shared(OriginKind::State, Some("count".to_string()));
//! let entry = LogEntry::new("Counter-1", origin.clone(), Some(Phase::Init), Payload::from("0"));
//!
//! origin.set_display("0");
//! assert_eq!(origin.describe(), "state«count»:0");
//! assert!(entry.is_from(&origin));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Host framework / wrappers        │
//! ├─────────────────────────────────────────┤
//! │           hooktrace (facade)            │
//! ├─────────────────────────────────────────┤
//! │ registry │ observe │ replay │ host      │
//! ├─────────────────────────────────────────┤
//! │             hooktrace-core              │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod format;
pub mod origin;

// Re-export main types at crate root
pub use config::{HookTraceConfig, RegistryConfig, ReplayConfig, ReplayDelay, TracerConfig};
pub use entry::{LogEntries, LogEntry, Payload, Phase, SelectedEntry, TracedValue, ValuePayload};
pub use error::{ConfigError, ConfigResult};
pub use format::{
    Props, UNDEFINED, entry_json, entry_line, show_json, show_optional, show_props, show_props_with,
};
pub use origin::{OriginId, OriginKind, SharedOrigin, TraceOrigin};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        HookTraceConfig, RegistryConfig, ReplayConfig, ReplayDelay, TracerConfig,
    };
    pub use crate::entry::{LogEntries, LogEntry, Payload, Phase, SelectedEntry, ValuePayload};
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::format::Props;
    pub use crate::origin::{OriginId, OriginKind, SharedOrigin, TraceOrigin};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::format;

    #[test]
    fn test_entries_render_current_origin_display() {
        let origin = TraceOrigin::shared(OriginKind::Ref, Some("input".to_string()));
        let mut log = LogEntries::new();
        log.push_back(LogEntry::new(
            "Form-1",
            origin.clone(),
            Some(Phase::Init),
            Payload::Value(ValuePayload::json(Option::<u32>::None)),
        ));

        origin.set_display("42");

        let entry = &log[0];
        assert_eq!(format::entry_line(0, entry), format!(
            "   0 {:<16} {:<20} {:<9} null",
            "Form-1", "ref«input»", "init"
        ));
        assert_eq!(entry.origin().describe(), "ref«input»:42");
    }
}
