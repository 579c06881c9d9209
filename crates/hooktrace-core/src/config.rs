//! Configuration types for the tracer, the registry and the replay engine.
//!
//! Every type has builder methods and deserializes from TOML with defaults
//! for any missing field:
//!
//! ```toml
//! [tracer]
//! mirror_to_console = true
//!
//! [replay]
//! delay = 1.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Configuration for the tracer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Record trace entries at all.
    ///
    /// When disabled, every trace call returns immediately.
    pub enabled: bool,

    /// Also write every entry to the trace sink as it is recorded.
    pub mirror_to_console: bool,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mirror_to_console: false,
        }
    }
}

impl TracerConfig {
    /// Create a new tracer configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable tracing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable or disable console mirroring.
    pub fn with_mirror_to_console(mut self, mirror: bool) -> Self {
        self.mirror_to_console = mirror;
        self
    }

    /// A configuration that records nothing.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mirror_to_console: false,
        }
    }
}

/// Configuration for the component identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Allocate a fresh identity when a node's type name differs from the
    /// name recorded on its predecessor's identity.
    ///
    /// When false, the predecessor's identity is inherited unconditionally.
    pub split_on_type_change: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            split_on_type_change: true,
        }
    }
}

impl RegistryConfig {
    /// Create a new registry configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure identity splitting on type change.
    pub fn with_split_on_type_change(mut self, split: bool) -> Self {
        self.split_on_type_change = split;
        self
    }
}

/// Delay between automatic replay steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum ReplayDelay {
    /// 250 milliseconds.
    QuarterSecond,
    /// 500 milliseconds.
    #[default]
    HalfSecond,
    /// 1 second.
    OneSecond,
    /// 2 seconds.
    TwoSeconds,
    /// 5 seconds.
    FiveSeconds,
    /// 10 seconds.
    TenSeconds,
}

impl ReplayDelay {
    /// All supported delays, shortest first.
    pub const ALL: [ReplayDelay; 6] = [
        ReplayDelay::QuarterSecond,
        ReplayDelay::HalfSecond,
        ReplayDelay::OneSecond,
        ReplayDelay::TwoSeconds,
        ReplayDelay::FiveSeconds,
        ReplayDelay::TenSeconds,
    ];

    /// The delay in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        match self {
            ReplayDelay::QuarterSecond => 0.25,
            ReplayDelay::HalfSecond => 0.5,
            ReplayDelay::OneSecond => 1.0,
            ReplayDelay::TwoSeconds => 2.0,
            ReplayDelay::FiveSeconds => 5.0,
            ReplayDelay::TenSeconds => 10.0,
        }
    }

    /// The delay as a duration.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs_f64(self.as_secs_f64())
    }

    /// Find the supported delay with exactly this many seconds.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_secs_f64() == secs)
    }

    /// Parse a stored delay such as `"0.5"`.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().and_then(Self::from_secs_f64)
    }
}

impl TryFrom<f64> for ReplayDelay {
    type Error = ConfigError;

    fn try_from(secs: f64) -> Result<Self, Self::Error> {
        Self::from_secs_f64(secs).ok_or(ConfigError::UnsupportedDelay(secs))
    }
}

impl From<ReplayDelay> for f64 {
    fn from(delay: ReplayDelay) -> Self {
        delay.as_secs_f64()
    }
}

impl std::fmt::Display for ReplayDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_secs_f64())
    }
}

/// Configuration for the replay engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Initial delay between replay steps.
    ///
    /// A delay stored in the host's key/value store takes precedence.
    pub delay: ReplayDelay,
}

impl ReplayConfig {
    /// Create a new replay configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the replay delay.
    pub fn with_delay(mut self, delay: ReplayDelay) -> Self {
        self.delay = delay;
        self
    }
}

/// Complete hooktrace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookTraceConfig {
    /// Tracer settings.
    pub tracer: TracerConfig,
    /// Registry settings.
    pub registry: RegistryConfig,
    /// Replay settings.
    pub replay: ReplayConfig,
}

impl HookTraceConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the tracer configuration.
    pub fn with_tracer(mut self, tracer: TracerConfig) -> Self {
        self.tracer = tracer;
        self
    }

    /// Set the registry configuration.
    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set the replay configuration.
    pub fn with_replay(mut self, replay: ReplayConfig) -> Self {
        self.replay = replay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HookTraceConfig::default();
        assert!(config.tracer.enabled);
        assert!(!config.tracer.mirror_to_console);
        assert!(config.registry.split_on_type_change);
        assert_eq!(config.replay.delay, ReplayDelay::HalfSecond);
    }

    #[test]
    fn test_builder() {
        let config = HookTraceConfig::new()
            .with_tracer(TracerConfig::new().with_mirror_to_console(true))
            .with_replay(ReplayConfig::new().with_delay(ReplayDelay::TwoSeconds));

        assert!(config.tracer.mirror_to_console);
        assert_eq!(config.replay.delay.as_duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_from_toml() {
        let config = HookTraceConfig::from_toml_str(
            r#"
            [tracer]
            mirror_to_console = true

            [registry]
            split_on_type_change = false

            [replay]
            delay = 0.25
            "#,
        )
        .unwrap();

        assert!(config.tracer.enabled);
        assert!(config.tracer.mirror_to_console);
        assert!(!config.registry.split_on_type_change);
        assert_eq!(config.replay.delay, ReplayDelay::QuarterSecond);
    }

    #[test]
    fn test_from_toml_rejects_unknown_delay() {
        let result = HookTraceConfig::from_toml_str("[replay]\ndelay = 3.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_delay_parse() {
        assert_eq!(ReplayDelay::parse("0.5"), Some(ReplayDelay::HalfSecond));
        assert_eq!(ReplayDelay::parse(" 10 "), Some(ReplayDelay::TenSeconds));
        assert_eq!(ReplayDelay::parse("7"), None);
        assert_eq!(ReplayDelay::parse("fast"), None);
        assert_eq!(ReplayDelay::OneSecond.to_string(), "1");
    }
}
