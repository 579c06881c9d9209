//! Console mirroring sinks.
//!
//! When mirroring is on, the tracer hands every entry to its [`TraceSink`]
//! synchronously, as it is recorded.

use hooktrace_core::LogEntry;
use hooktrace_core::format;
use parking_lot::RwLock;

/// Destination for mirrored log entries.
pub trait TraceSink: Send + Sync {
    /// Called with each mirrored entry and its index in the log.
    fn emit(&self, index: usize, entry: &LogEntry);
}

/// Writes one human-readable line per entry to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl TraceSink for StderrSink {
    fn emit(&self, index: usize, entry: &LogEntry) {
        eprintln!("{}", format::entry_line(index, entry));
    }
}

/// Emits each entry as a `tracing` event.
#[derive(Debug, Clone)]
pub struct LoggingSink {
    /// Level of the emitted events.
    pub level: tracing::Level,
}

impl LoggingSink {
    /// Create a new logging sink at info level.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
        }
    }

    /// Set the level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! trace_entry {
    ($level:expr, $index:expr, $entry:expr) => {{
        let entry = $entry;
        let origin = entry.origin();
        let phase = entry.phase().map(|p| p.as_str()).unwrap_or("");
        let payload = entry.payload().show().unwrap_or_default();
        tracing::event!(
            $level,
            index = $index,
            component = entry.component_label(),
            origin = %origin.kind(),
            label = origin.label().unwrap_or(""),
            phase,
            payload = payload.as_str(),
            "Trace entry"
        );
    }};
}

impl TraceSink for LoggingSink {
    fn emit(&self, index: usize, entry: &LogEntry) {
        match self.level {
            tracing::Level::ERROR => trace_entry!(tracing::Level::ERROR, index, entry),
            tracing::Level::WARN => trace_entry!(tracing::Level::WARN, index, entry),
            tracing::Level::INFO => trace_entry!(tracing::Level::INFO, index, entry),
            tracing::Level::DEBUG => trace_entry!(tracing::Level::DEBUG, index, entry),
            _ => trace_entry!(tracing::Level::TRACE, index, entry),
        }
    }
}

/// Captures mirrored lines in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: RwLock<Vec<String>>,
}

impl CollectingSink {
    /// Create an empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the captured lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().clone()
    }

    /// Number of captured lines.
    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    /// Check if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    /// Forget the captured lines.
    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

impl TraceSink for CollectingSink {
    fn emit(&self, index: usize, entry: &LogEntry) {
        self.lines.write().push(format::entry_line(index, entry));
    }
}
