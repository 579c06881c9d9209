//! Demo command - Run the demo component tree.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use hooktrace::prelude::*;
use hooktrace_core::{entry_json, entry_line};

use crate::OutputFormat;
use crate::app::{self, Controls};

/// Arguments for the demo command.
#[derive(Args)]
pub struct DemoArgs {
    /// How many times every counter is clicked
    #[arg(long, default_value = "3")]
    pub clicks: u32,

    /// Replay the log step by step instead of printing it at once
    #[arg(long)]
    pub replay: bool,

    /// Replay delay in seconds (0.25, 0.5, 1, 2, 5 or 10)
    #[arg(long, value_parser = parse_delay)]
    pub delay: Option<ReplayDelay>,

    /// Mirror entries to stderr as they are recorded
    #[arg(long)]
    pub mirror: bool,
}

fn parse_delay(text: &str) -> std::result::Result<ReplayDelay, String> {
    ReplayDelay::parse(text).ok_or_else(|| {
        let supported: Vec<String> = ReplayDelay::ALL.iter().map(ToString::to_string).collect();
        format!("unsupported delay, expected one of {}", supported.join(", "))
    })
}

/// Execute the demo command.
pub fn execute(
    args: DemoArgs,
    config: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let mut builder = match config {
        Some(path) => HookTrace::from_config_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HookTrace::builder(),
    };
    if args.mirror {
        builder = builder.with_mirror_to_console(true);
    }
    if let Some(delay) = args.delay {
        builder = builder.with_replay_delay(delay);
    }
    let runtime = builder.build();

    if args.replay {
        return replay(&runtime, args.clicks, format, quiet);
    }

    // Without a log viewer the tracer falls back to stderr; keep stdout for
    // the log itself.
    runtime.tracer().register_log_viewer();

    let controls = Controls::new();
    let mut host = runtime.host();
    app::run_script(&mut host, &controls, args.clicks).context("Demo render failed")?;

    match format {
        OutputFormat::Human => {
            if !quiet {
                println!("{} entries:", runtime.tracer().len());
            }
            for line in runtime.export_lines() {
                println!("{}", line);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&runtime.export_json())?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&runtime.export_json())?);
        }
    }

    Ok(())
}

/// Run the script with a replay engine attached and print every entry the
/// engine selects.
fn replay(runtime: &HookTraceRuntime, clicks: u32, format: OutputFormat, quiet: bool) -> Result<()> {
    let timers = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start timer runtime")?;

    timers.block_on(async {
        let engine = runtime.replay_current()?;
        if !quiet {
            println!("Replaying every {}s", engine.delay());
        }

        runtime.tracer().subscribe_selected_entry(move |selected| {
            let Some(selected) = selected else {
                return;
            };
            match format {
                OutputFormat::Human => println!("{}", entry_line(selected.index, &selected.entry)),
                OutputFormat::Json | OutputFormat::JsonCompact => {
                    println!("{}", entry_json(selected.index, &selected.entry));
                }
            }
        });

        let controls = Controls::new();
        let mut host = runtime.host();
        app::run_script(&mut host, &controls, clicks).context("Demo render failed")?;

        let poll = engine.delay().as_duration() / 4;
        while engine.state() == ReplayState::Replaying {
            tokio::time::sleep(poll.max(Duration::from_millis(10))).await;
            runtime.drain();
        }
        runtime.drain();

        tracing::info!(state = %engine.state(), selected = ?engine.selected_index(), "Replay finished");
        Ok::<(), anyhow::Error>(())
    })
}
