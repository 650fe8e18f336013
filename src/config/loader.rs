use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::schema::Config;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// CLI flags that override file and environment settings
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub engine_url: Option<String>,
    pub model: Option<String>,
}

/// Loads configuration in three layers: file, then environment variables,
/// then CLI flags (highest precedence). Validation failures are fatal.
pub fn load_config(overrides: CliOverrides) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.promptlane/config.json)
    let config_file = overrides
        .config_path
        .clone()
        .or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = read_config_file(path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variables
    config = merge_env_variables(config);

    // Layer 3: CLI flags
    if let Some(url) = overrides.engine_url {
        tracing::debug!(engine_url = %url, "Applying CLI engine URL override");
        config.engine.base_url = url;
    }
    if let Some(model) = overrides.model {
        tracing::debug!(model = %model, "Applying CLI model override");
        config.engine.model = model;
    }

    config
        .validate()
        .map_err(ConfigError::Invalid)
        .context("Configuration rejected")?;

    tracing::debug!(
        engine_url = %config.engine.base_url,
        model = %config.engine.model,
        max_sessions = config.max_sessions,
        reap_interval_secs = config.reap_interval_secs,
        session_max_age_minutes = config.session_max_age_minutes,
        "Configuration loaded"
    );

    Ok(config)
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".promptlane").join("config.json"))
}

fn read_config_file(path: &PathBuf) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = serde_json::from_str(&content)
        .map_err(ConfigError::InvalidJson)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

fn merge_env_variables(mut config: Config) -> Config {
    if let Ok(url) = std::env::var("PROMPTLANE_ENGINE_URL") {
        if !url.is_empty() {
            config.engine.base_url = url;
        }
    }
    if let Ok(model) = std::env::var("PROMPTLANE_MODEL") {
        if !model.is_empty() {
            config.engine.model = model;
        }
    }
    if let Ok(value) = std::env::var("PROMPTLANE_MAX_SESSIONS") {
        match value.parse::<usize>() {
            Ok(n) => config.max_sessions = n,
            Err(_) => tracing::warn!(value = %value, "Ignoring non-numeric PROMPTLANE_MAX_SESSIONS"),
        }
    }
    if let Ok(value) = std::env::var("PROMPTLANE_REAP_INTERVAL_SECS") {
        match value.parse::<u64>() {
            Ok(n) => config.reap_interval_secs = n,
            Err(_) => {
                tracing::warn!(value = %value, "Ignoring non-numeric PROMPTLANE_REAP_INTERVAL_SECS")
            }
        }
    }
    if let Ok(value) = std::env::var("PROMPTLANE_SESSION_MAX_AGE_MINUTES") {
        match value.parse::<u64>() {
            Ok(n) => config.session_max_age_minutes = n,
            Err(_) => tracing::warn!(
                value = %value,
                "Ignoring non-numeric PROMPTLANE_SESSION_MAX_AGE_MINUTES"
            ),
        }
    }
    if let Ok(role) = std::env::var("PROMPTLANE_SYSTEM_ROLE") {
        if !role.trim().is_empty() {
            config.system_role = role;
        }
    }
    config
}
