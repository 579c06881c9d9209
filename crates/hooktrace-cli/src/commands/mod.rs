//! CLI subcommands.

pub mod check_config;
pub mod demo;
