use crate::cli::Args;
use crate::core::config::WaypointConfig;
use anyhow::{anyhow, Context};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Console output format for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutput {
    Pretty,
    Json,
}

impl std::str::FromStr for ConsoleOutput {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pretty" => Ok(ConsoleOutput::Pretty),
            "json" => Ok(ConsoleOutput::Json),
            other => Err(anyhow!("unsupported log format: {}", other)),
        }
    }
}

/// Initialize the tracing subscriber for the CLI binary.
///
/// Precedence for the filter: `RUST_LOG`, then `--log-level`, then the
/// configured default. Errors when invoked more than once per process.
pub fn init(args: &Args, config: &WaypointConfig) -> crate::Result<()> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let default_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.default_level.clone());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_level))
        .context("failed to configure tracing level")?;

    let format: ConsoleOutput = args
        .log_format
        .as_deref()
        .unwrap_or(&config.logging.format)
        .parse()?;

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        ConsoleOutput::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .init();
        }
        ConsoleOutput::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_target(false))
                .init();
        }
    }
    Ok(())
}
