use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
pub struct ValidateArgs {
    /// Task definition JSON file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Decode unregistered step types as generic steps
    #[arg(long)]
    pub allow_unknown: bool,
}

#[derive(Debug, Parser)]
pub struct ExplainArgs {
    /// Task definition JSON file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit the description as JSON instead of text
    #[arg(long)]
    pub json: bool,
}
