pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for inspecting and validating task definitions.
#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Survey task navigation toolkit")]
pub struct Args {
    /// Path to the configuration file (default: waypoint.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tracing filter when RUST_LOG is not set (e.g. "debug")
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Console log format: "pretty" or "json"
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode a task definition and report validation problems
    Validate(args::ValidateArgs),

    /// Describe a task definition: its steps, rules, and progress markers
    Explain(args::ExplainArgs),
}
