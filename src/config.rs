use serde::{Deserialize, Serialize};

use crate::actions::ModuleActionKind;
use crate::error::ConfigError;
use crate::types::MAX_ACTIONS_PER_EPISODE;

pub const ENV_MAX_ACTIONS: &str = "STEP_MAX_ACTIONS";
pub const ENV_LOG_TRAJECTORY: &str = "STEP_LOG_TRAJECTORY";
pub const ENV_ROOT_MODULE: &str = "STEP_ROOT_MODULE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard cap on atomic actions submitted per episode.
    pub max_actions: usize,
    pub log_trajectory: bool,
    /// Composite kind bound to the top-level objective.
    pub root_module: ModuleActionKind,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_actions: MAX_ACTIONS_PER_EPISODE,
            log_trajectory: false,
            root_module: ModuleActionKind::MapPlanner,
        }
    }
}

impl AgentConfig {
    /// Read overrides from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_ACTIONS) {
            config.max_actions = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: ENV_MAX_ACTIONS,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(raw) = lookup(ENV_LOG_TRAJECTORY) {
            config.log_trajectory = parse_flag(&raw).ok_or_else(|| ConfigError::Invalid {
                key: ENV_LOG_TRAJECTORY,
                value: raw.clone(),
                reason: "expected 1/0, true/false or yes/no".to_string(),
            })?;
        }

        if let Some(raw) = lookup(ENV_ROOT_MODULE) {
            config.root_module = raw.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_ROOT_MODULE,
                value: raw.clone(),
                reason: "unknown module".to_string(),
            })?;
        }

        Ok(config)
    }

    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.max_actions = max_actions;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_trajectory = enabled;
        self
    }

    pub fn with_root(mut self, module: ModuleActionKind) -> Self {
        self.root_module = module;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
