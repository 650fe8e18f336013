use serde::{Deserialize, Serialize};

use crate::engine::OllamaEngineConfig;

fn default_max_sessions() -> usize {
    32
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_session_max_age_minutes() -> u64 {
    30
}

fn default_system_role() -> String {
    "You are a helpful assistant.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Inference engine connection settings
    #[serde(default)]
    pub engine: OllamaEngineConfig,

    /// Concurrent-session ceiling
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Reaper sweep interval
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Sessions idle longer than this are reaped
    #[serde(default = "default_session_max_age_minutes")]
    pub session_max_age_minutes: u64,

    /// Initial process-wide system role
    #[serde(default = "default_system_role")]
    pub system_role: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: OllamaEngineConfig::default(),
            max_sessions: default_max_sessions(),
            reap_interval_secs: default_reap_interval_secs(),
            session_max_age_minutes: default_session_max_age_minutes(),
            system_role: default_system_role(),
        }
    }
}

impl Config {
    /// Rejects values the gateway cannot start with. Fatal at startup.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.base_url.trim().is_empty() {
            return Err("engine.base_url must not be empty".to_string());
        }
        if self.engine.model.trim().is_empty() {
            return Err("engine.model must not be empty".to_string());
        }
        if self.max_sessions == 0 {
            return Err("max_sessions must be at least 1".to_string());
        }
        if self.reap_interval_secs == 0 {
            return Err("reap_interval_secs must be at least 1".to_string());
        }
        if self.session_max_age_minutes == 0 {
            return Err("session_max_age_minutes must be at least 1".to_string());
        }
        if self.system_role.trim().is_empty() {
            return Err("system_role must not be empty".to_string());
        }
        Ok(())
    }
}
