//! `hooktrace`: drive the demo component tree and look at what it traced.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

/// Trace hook activity in a component tree and replay the log
#[derive(Parser)]
#[command(name = "hooktrace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with tracer, registry and replay settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// How trace entries and reports are printed
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Raise diagnostic logging on stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Skip status lines and error messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Rendering of entries and reports on stdout.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// One aligned line per entry
    #[default]
    Human,
    /// Indented JSON
    Json,
    /// One JSON document per line
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo component tree and print its trace log
    Demo(commands::demo::DemoArgs),
    /// Validate a configuration file
    CheckConfig(commands::check_config::CheckConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Demo(args) => {
            commands::demo::execute(args, cli.config.as_deref(), cli.format, cli.quiet)
        }
        Commands::CheckConfig(args) => {
            commands::check_config::execute(args, cli.config.as_deref(), cli.format)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("hooktrace: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise each `-v` makes hooktrace logging one level more verbose.
fn log_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = ["warn", "info", "debug"]
            .get(usize::from(verbose))
            .copied()
            .unwrap_or("trace");
        EnvFilter::new(format!("hooktrace={level}"))
    })
}
