//! Configuration loading

use anyhow::Result;
use std::path::Path;

use crate::Config;

const CONFIG_PATH_ENV: &str = "REELGATE_CONFIG_PATH";
const CANDIDATE_PATHS: [&str; 2] = ["config.yaml", "/config/config.yaml"];

/// First existing config file: `$REELGATE_CONFIG_PATH`, `./config.yaml`, `/config/config.yaml`
#[must_use]
pub fn discover_config_path() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            CANDIDATE_PATHS
                .iter()
                .find(|p| Path::new(p).exists())
                .map(|p| (*p).to_string())
        })
}

/// Load and validate configuration.
///
/// Runs before logging is installed, so progress goes to stderr.
pub fn load_config() -> Result<Config> {
    let config = match discover_config_path() {
        Some(path) => {
            eprintln!("Loading config from {path}");
            Config::from_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
        }
        None => {
            eprintln!("No config file found, using environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}
