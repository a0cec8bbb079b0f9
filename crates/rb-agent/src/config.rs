//! Agent configuration.
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! file (or none at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Administrator-provided policy URL. Wins over the stored one and cannot
    /// be changed through the agent.
    pub managed_policy_url: Option<String>,
    /// JSON state file. In-memory state when unset.
    pub state_path: Option<PathBuf>,
    /// Delay before the first scheduled refresh.
    pub refresh_delay_secs: u64,
    /// Interval between scheduled refreshes.
    pub refresh_period_secs: u64,
    /// Upper bound on a single liveness probe.
    pub probe_timeout_ms: u64,
    /// Upper bound on fetching the policy document.
    pub fetch_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            managed_policy_url: None,
            state_path: None,
            refresh_delay_secs: 60,
            refresh_period_secs: 600,
            probe_timeout_ms: 5_000,
            fetch_timeout_ms: 30_000,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_delay_secs)
    }

    /// Never zero; a zero period would make the scheduler spin.
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
