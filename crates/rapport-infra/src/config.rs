//! Tracker configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.rapport/` in production)
//! and deserializes it into [`TrackerConfig`]. Falls back to defaults when the
//! file is missing or malformed; a file that parses but carries invalid
//! values is rejected.

use std::path::{Path, PathBuf};

use rapport_types::config::TrackerConfig;
use rapport_types::error::ConfigError;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `RAPPORT_DATA_DIR` environment variable
/// 2. `~/.rapport`
/// 3. `.rapport` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RAPPORT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".rapport");
    }

    PathBuf::from(".rapport")
}

/// Directory holding one persisted store per conversation.
pub fn stores_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("stores")
}

/// Load tracker configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`TrackerConfig::default()`].
/// - Unreadable or unparsable file: logs a warning, returns the default.
/// - Parsed file with out-of-range values: [`ConfigError::Invalid`].
pub async fn load_tracker_config(data_dir: &Path) -> Result<TrackerConfig, ConfigError> {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return Ok(TrackerConfig::default());
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return Ok(TrackerConfig::default());
        }
    };

    let config = match parse_tracker_config(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            return Ok(TrackerConfig::default());
        }
    };

    config.validate()?;
    Ok(config)
}

/// Parse a TOML document into a [`TrackerConfig`] without validating it.
pub fn parse_tracker_config(content: &str) -> Result<TrackerConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}
