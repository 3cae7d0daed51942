use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Main Waypoint configuration loaded from waypoint.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WaypointConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task decoding configuration
    #[serde(default)]
    pub factory: FactoryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    #[serde(default = "default_level")]
    pub default_level: String,

    /// Console output format: "pretty" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            format: default_format(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

/// Task decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FactoryConfig {
    /// Decode steps with an unregistered "type" as generic steps instead of
    /// failing. Off by default so that typos in task definitions surface.
    #[serde(default)]
    pub allow_unknown_step_types: bool,
}

impl WaypointConfig {
    /// Load the configuration from the given path, or `waypoint.toml` in the
    /// current directory. A missing file yields the defaults; a malformed
    /// file is reported and the defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| Path::new("waypoint.toml").to_path_buf());
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return WaypointConfig::default(),
        };
        match toml::from_str(&text) {
            Ok(config) => config,
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring malformed config file");
                WaypointConfig::default()
            }
        }
    }
}
