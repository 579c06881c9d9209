//! Core error types for hooktrace.
//!
//! Only configuration loading can fail in the core crate. Tracing itself is
//! infallible by contract; registry misuse has its own error type in
//! `hooktrace-registry`.

use thiserror::Error;

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text is not valid TOML or has wrong field types.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A replay delay outside the supported set was given.
    #[error("Unsupported replay delay: {0}s")]
    UnsupportedDelay(f64),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
