//! Check-config command - Validate a hooktrace configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hooktrace_core::HookTraceConfig;

use crate::OutputFormat;

/// Arguments for the check-config command.
#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to the configuration file (defaults to --config)
    pub path: Option<PathBuf>,
}

/// Validation result.
#[derive(Debug, Serialize)]
struct CheckResult {
    valid: bool,
    path: String,
    config: Option<HookTraceConfig>,
    errors: Vec<String>,
}

/// Execute the check-config command.
pub fn execute(args: CheckConfigArgs, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let path = args
        .path
        .as_deref()
        .or(config)
        .context("No configuration file given; pass a path or --config")?;

    let mut result = CheckResult {
        valid: true,
        path: path.display().to_string(),
        config: None,
        errors: Vec::new(),
    };

    match HookTraceConfig::from_file(path) {
        Ok(config) => result.config = Some(config),
        Err(e) => {
            result.valid = false;
            result.errors.push(e.to_string());
        }
    }

    match format {
        OutputFormat::Human => {
            if let Some(config) = &result.config {
                println!("Configuration is valid: {}", path.display());
                println!();
                print!(
                    "{}",
                    toml::to_string_pretty(config).context("Failed to render configuration")?
                );
            } else {
                println!("Configuration is INVALID: {}", path.display());
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Configuration check failed"))
    }
}
