//! Replay delay preference.
//!
//! The replay delay is the one piece of user state that outlives an engine.
//! It is kept in a host-provided key/value store as a decimal number of
//! seconds.

use std::collections::HashMap;
use std::sync::Arc;

use hooktrace_core::ReplayDelay;
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Key the replay delay is stored under.
pub const REPLAY_DELAY_KEY: &str = "hooktrace:replay-timer-delay";

/// Host-provided string store.
pub trait KeyValueStore: Send + Sync {
    /// Get a stored value.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value.
    fn set(&self, key: &str, value: &str);
}

/// In-memory key/value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }
}

/// Reads and writes the replay delay through a [`KeyValueStore`].
#[derive(Clone)]
pub struct DelayPreference {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl DelayPreference {
    /// Create a preference stored under [`REPLAY_DELAY_KEY`].
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: REPLAY_DELAY_KEY.to_string(),
        }
    }

    /// Use a different key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Get the key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored delay, or `default` if none or not a supported delay.
    pub fn load(&self, default: ReplayDelay) -> ReplayDelay {
        match self.store.get(&self.key) {
            None => default,
            Some(stored) => ReplayDelay::parse(&stored).unwrap_or_else(|| {
                warn!(key = %self.key, value = %stored, "Ignoring unsupported stored replay delay");
                default
            }),
        }
    }

    /// Store a delay.
    pub fn save(&self, delay: ReplayDelay) {
        self.store.set(&self.key, &delay.to_string());
        debug!(key = %self.key, delay = %delay, "Replay delay saved");
    }
}

impl std::fmt::Debug for DelayPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayPreference")
            .field("key", &self.key)
            .finish()
    }
}
