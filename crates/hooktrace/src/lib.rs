//! # Hooktrace - Run-time Tracer for Hook-based Components
//!
//! Hooktrace records what the stateful call sites of a component tree do,
//! one log entry at a time, and lets you step backward and forward through
//! that log.
//!
//! ## Features
//!
//! - **Stable identity**: Every traced component instance gets a label like
//!   `Counter-2` that survives any number of render passes
//! - **Call-site ordering**: Conditionally invoked hooks fail loudly
//! - **Deferred notification**: Subscribers never run inside a render pass
//! - **Replay**: Play, pause, step and seek through the log on a timer
//!
//! ## Quick Start
//!
//! ```
//! use hooktrace::prelude::*;
//!
//! let runtime = HookTrace::builder()
//!     .with_sink(Arc::new(CollectingSink::new()))
//!     .build();
//!
//! let mut host = runtime.host();
//! host.mount(Element::new("Counter", |cx| {
//!     cx.use_tracer()?;
//!     let (_count, _set_count) = cx.use_state(|| 0)?;
//!     Ok(vec![])
//! }))?;
//!
//! for line in runtime.export_lines() {
//!     println!("{line}");
//! }
//! # Ok::<(), HookTraceError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Components (host crate)                 │
//! ├─────────────────────────────────────────────────────────┤
//! │                    hooktrace (facade)                   │
//! │                  ┌───────────────────┐                  │
//! │                  │ HookTrace Builder │                  │
//! │                  └─────────┬─────────┘                  │
//! │                            │                            │
//! │  ┌───────────────────┬─────┴────────────┬────────────┐  │
//! │  │ hooktrace-registry│ hooktrace-observe│  -replay   │  │
//! │  │ (identities,      │ (tracer, queue,  │ (engine,   │  │
//! │  │  call sites)      │  observables)    │  timer)    │  │
//! │  └───────────────────┴──────────────────┴────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                     hooktrace-core                      │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use hooktrace_core::{
    ConfigError, HookTraceConfig, ReplayDelay, TracerConfig, entry_json, entry_line,
};
use hooktrace_host::{Host, HostError};
use hooktrace_observe::{SharedTracer, TaskQueue, TraceSink, Tracer};
use hooktrace_registry::{ComponentRegistry, RegistryError};
use hooktrace_replay::{KeyValueStore, MemoryStore, ReplayEngine};
use tokio::runtime::Handle;
use tracing::info;

// Re-export from sub-crates
pub use hooktrace_core;
pub use hooktrace_host;
pub use hooktrace_observe;
pub use hooktrace_registry;
pub use hooktrace_replay;

/// Main entry point for hooktrace.
pub struct HookTrace;

impl HookTrace {
    /// Create a new runtime builder.
    pub fn builder() -> HookTraceBuilder {
        HookTraceBuilder::new()
    }

    /// Create a runtime with default configuration.
    pub fn with_defaults() -> HookTraceRuntime {
        HookTraceBuilder::new().build()
    }

    /// Create a builder from TOML configuration text.
    pub fn from_toml_str(text: &str) -> Result<HookTraceBuilder, HookTraceError> {
        let config = HookTraceConfig::from_toml_str(text)?;
        Ok(HookTraceBuilder::new().with_config(config))
    }

    /// Create a builder from a TOML configuration file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<HookTraceBuilder, HookTraceError> {
        let config = HookTraceConfig::from_file(path.as_ref())?;
        Ok(HookTraceBuilder::new().with_config(config))
    }
}

/// Builder for configuring the hooktrace runtime.
pub struct HookTraceBuilder {
    config: HookTraceConfig,
    sink: Option<Arc<dyn TraceSink>>,
    store: Option<Arc<dyn KeyValueStore>>,
    queue: Option<TaskQueue>,
}

impl HookTraceBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HookTraceConfig::default(),
            sink: None,
            store: None,
            queue: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: HookTraceConfig) -> Self {
        self.config = config;
        self
    }

    // Tracer configuration

    /// Enable or disable recording.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.config.tracer.enabled = enabled;
        self
    }

    /// Mirror every entry to the trace sink as it is recorded.
    pub fn with_mirror_to_console(mut self, mirror: bool) -> Self {
        self.config.tracer.mirror_to_console = mirror;
        self
    }

    /// Set the tracer configuration.
    pub fn with_tracer_config(mut self, tracer: TracerConfig) -> Self {
        self.config.tracer = tracer;
        self
    }

    /// Set where mirrored entries are written. Defaults to stderr.
    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use an existing task queue.
    pub fn with_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    // Registry configuration

    /// Allocate a fresh identity when a component's type changes in place.
    pub fn with_split_on_type_change(mut self, split: bool) -> Self {
        self.config.registry.split_on_type_change = split;
        self
    }

    // Replay configuration

    /// Set the default replay delay.
    pub fn with_replay_delay(mut self, delay: ReplayDelay) -> Self {
        self.config.replay.delay = delay;
        self
    }

    /// Set the store the replay delay preference lives in.
    /// Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> HookTraceRuntime {
        let queue = self.queue.unwrap_or_default();
        let tracer = match self.sink {
            Some(sink) => Tracer::with_sink(self.config.tracer.clone(), queue, sink),
            None => Tracer::new(self.config.tracer.clone(), queue),
        };
        let registry = ComponentRegistry::with_config(self.config.registry.clone());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);

        info!(
            enabled = self.config.tracer.enabled,
            mirror = self.config.tracer.mirror_to_console,
            "Hooktrace runtime built"
        );

        HookTraceRuntime {
            config: self.config,
            registry: Arc::new(registry),
            tracer: tracer.into_shared(),
            store,
        }
    }
}

impl Default for HookTraceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured hooktrace runtime.
///
/// Owns the registry and tracer that hosts render against, and creates
/// replay engines that follow the tracer.
pub struct HookTraceRuntime {
    config: HookTraceConfig,
    registry: Arc<ComponentRegistry>,
    tracer: SharedTracer,
    store: Arc<dyn KeyValueStore>,
}

impl HookTraceRuntime {
    /// Get the configuration.
    pub fn config(&self) -> &HookTraceConfig {
        &self.config
    }

    /// Get the component registry.
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Get the tracer.
    pub fn tracer(&self) -> &SharedTracer {
        &self.tracer
    }

    /// Get the task queue notifications are deferred on.
    pub fn queue(&self) -> &TaskQueue {
        self.tracer.queue()
    }

    /// Get the key/value store.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Create a host rendering against this runtime.
    pub fn host(&self) -> Host {
        Host::new(Arc::clone(&self.registry), Arc::clone(&self.tracer))
    }

    /// Create a replay engine spawning its timer on `runtime`.
    pub fn replay(&self, runtime: Handle) -> ReplayEngine {
        ReplayEngine::new(
            Arc::clone(&self.tracer),
            self.config.replay.clone(),
            Arc::clone(&self.store),
            runtime,
        )
    }

    /// Create a replay engine on the current tokio runtime.
    pub fn replay_current(&self) -> Result<ReplayEngine, HookTraceError> {
        let runtime = Handle::try_current()?;
        Ok(self.replay(runtime))
    }

    /// Run deferred notifications. Returns how many tasks ran.
    pub fn drain(&self) -> usize {
        self.queue().drain()
    }

    /// The log as human-readable lines.
    pub fn export_lines(&self) -> Vec<String> {
        self.tracer
            .log_entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| entry_line(index, entry))
            .collect()
    }

    /// The log as a JSON array.
    pub fn export_json(&self) -> serde_json::Value {
        self.tracer
            .log_entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| entry_json(index, entry))
            .collect()
    }

    /// Forget every identity and clear the log.
    ///
    /// Intended for test isolation only.
    pub fn reset(&self) {
        self.registry.reset();
        self.tracer.clear_log();
        self.drain();
    }
}

impl std::fmt::Debug for HookTraceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTraceRuntime")
            .field("config", &self.config)
            .field("tracer", &self.tracer)
            .finish()
    }
}

/// Errors from the hooktrace runtime.
#[derive(Debug, thiserror::Error)]
pub enum HookTraceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Render error.
    #[error("Render error: {0}")]
    Host(#[from] HostError),

    /// No tokio runtime to spawn the replay timer on.
    #[error("No tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{HookTrace, HookTraceBuilder, HookTraceError, HookTraceRuntime};

    // Core types
    pub use hooktrace_core::{
        HookTraceConfig, LogEntry, OriginKind, Payload, Phase, Props, ReplayConfig, ReplayDelay,
        TraceOrigin, TracerConfig,
    };

    // Registry types
    pub use hooktrace_registry::{ComponentIdentity, ComponentRegistry, RenderNode};

    // Observe types
    pub use hooktrace_observe::{
        CollectingSink, LoggingSink, StderrSink, TaskQueue, TraceSink, Tracer,
    };

    // Replay types
    pub use hooktrace_replay::{
        Direction, KeyValueStore, MemoryStore, ReplayEngine, ReplayState,
    };

    // Host types
    pub use hooktrace_host::{
        Cleanup, Context, Element, HookOptions, Host, HostError, ReducerOptions, RenderCx,
        TracerOptions,
    };

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use super::*;
    use hooktrace_replay::REPLAY_DELAY_KEY;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn counter() -> (Element, Arc<Mutex<Option<hooktrace_host::StateSetter<u32>>>>) {
        let setter = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&setter);
        let element = Element::new("Counter", move |cx| {
            cx.use_tracer()?;
            let (_, set_count) = cx.use_state(|| 0_u32)?;
            *captured.lock() = Some(set_count);
            Ok(vec![])
        });
        (element, setter)
    }

    #[test]
    fn test_builder() {
        let runtime = HookTrace::builder()
            .with_mirror_to_console(true)
            .with_split_on_type_change(false)
            .with_replay_delay(ReplayDelay::TwoSeconds)
            .build();

        assert!(runtime.config().tracer.mirror_to_console);
        assert!(!runtime.registry().config().split_on_type_change);
        assert_eq!(runtime.config().replay.delay, ReplayDelay::TwoSeconds);
    }

    #[test]
    fn test_from_toml() {
        let builder = HookTrace::from_toml_str("[tracer]\nenabled = false\n").unwrap();
        assert!(!builder.build().tracer().is_enabled());

        let error = HookTrace::from_toml_str("[replay]\ndelay = 3.0\n")
            .err()
            .unwrap();
        assert!(matches!(error, HookTraceError::Config(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let result = HookTrace::from_config_file("/nonexistent/hooktrace.toml");
        assert!(matches!(
            result,
            Err(HookTraceError::Config(ConfigError::Io(_)))
        ));
    }

    #[test]
    fn test_console_fallback_without_viewer() {
        let sink = Arc::new(CollectingSink::new());
        let runtime = HookTrace::builder().with_sink(sink.clone()).build();
        let (element, setter) = counter();

        let mut host = runtime.host();
        host.mount(element).unwrap();

        // mounting, props, state init, mounted
        assert_eq!(sink.len(), 4);
        assert!(runtime.tracer().config().mirror_to_console);

        setter.lock().clone().unwrap().set(1);
        host.update().unwrap();
        assert_eq!(sink.len(), 6);
    }

    #[test]
    fn test_export() {
        let runtime = HookTrace::builder()
            .with_sink(Arc::new(CollectingSink::new()))
            .build();
        let (element, _) = counter();
        runtime.host().mount(element).unwrap();

        let lines = runtime.export_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| line.contains("Counter-1")));

        let json = runtime.export_json();
        assert_eq!(json.as_array().map(Vec::len), Some(4));
        assert_eq!(json[2]["phase"], "init");
    }

    #[test]
    fn test_replay_requires_runtime() {
        let runtime = HookTrace::with_defaults();
        assert!(matches!(
            runtime.replay_current(),
            Err(HookTraceError::NoRuntime(_))
        ));
    }

    #[test]
    fn test_reset() {
        let runtime = HookTrace::builder()
            .with_sink(Arc::new(CollectingSink::new()))
            .build();
        let (element, _) = counter();
        let mut host = runtime.host();
        host.mount(element).unwrap();
        host.unmount().unwrap();

        runtime.reset();
        assert!(runtime.tracer().is_empty());

        let (element, _) = counter();
        runtime.host().mount(element).unwrap();
        assert!(runtime.export_lines()[0].contains("Counter-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_replay() {
        let sink = Arc::new(CollectingSink::new());
        let runtime = HookTrace::builder()
            .with_sink(sink.clone())
            .with_replay_delay(ReplayDelay::OneSecond)
            .build();
        let engine = runtime.replay_current().unwrap();
        let (element, setter) = counter();

        let mut host = runtime.host();
        host.mount(element).unwrap();

        // The engine follows the new entries from the first one.
        assert_eq!(engine.state(), ReplayState::Replaying);
        assert_eq!(engine.selected_index(), Some(0));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(engine.selected_index(), Some(3));
        assert_eq!(engine.state(), ReplayState::Paused);

        runtime.drain();
        let selected = runtime.tracer().selected_entry().unwrap();
        assert_eq!(selected.index, 3);
        assert_eq!(selected.entry.phase(), Some(Phase::Mounted));

        // New activity is followed from the first new entry.
        setter.lock().clone().unwrap().set(7);
        host.update().unwrap();
        assert_eq!(engine.selected_index(), Some(4));
        assert_eq!(engine.state(), ReplayState::Replaying);

        engine.set_highlighted(1);
        engine.step(Direction::Backward);
        assert_eq!(engine.selected_index(), Some(0));
        assert_eq!(engine.state(), ReplayState::Paused);

        engine.set_delay(ReplayDelay::QuarterSecond);
        assert_eq!(runtime.store().get(REPLAY_DELAY_KEY).as_deref(), Some("0.25"));

        engine.clear_log();
        runtime.drain();
        assert_eq!(engine.state(), ReplayState::Idle);
        assert!(runtime.tracer().is_empty());
        assert!(runtime.tracer().selected_entry().is_none());

        // The engine is the log viewer, so nothing fell back to the sink.
        assert!(sink.is_empty());
    }
}
