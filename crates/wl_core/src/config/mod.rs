//! # Engine Configuration
//!
//! All tunable durations and policies of a field of play live here instead of
//! being hardcoded in the state machine.
//!
//! ## Usage
//! ```rust
//! use wl_core::config::EngineConfig;
//!
//! let config = EngineConfig::default();
//! let championship = EngineConfig::competition();
//! ```
//!
//! ## Environment Variables
//!
//! - `WL_ENGINE_PROFILE`: select a preset (competition, testing, default)

mod bus_config;
mod decision_config;
mod timer_config;

pub use bus_config::{BusConfig, BusCredentials, BusMode};
pub use decision_config::{DecisionConfig, RefereeTimeoutPolicy};
pub use timer_config::TimerConfig;

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use validator::Validate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Per-platform actor sizing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ActorConfig {
    /// Capacity of the inbound command queue.
    #[validate(range(min = 1, max = 65536))]
    pub queue_capacity: usize,
    /// Capacity of the outbound event channel; slower subscribers lag beyond this.
    #[validate(range(min = 1, max = 65536))]
    pub event_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self { queue_capacity: 256, event_capacity: 1024 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    #[validate]
    pub timer: TimerConfig,
    #[validate]
    pub decision: DecisionConfig,
    #[validate]
    pub bus: BusConfig,
    #[validate]
    pub actor: ActorConfig,
}

impl EngineConfig {
    /// Championship settings: 10-minute snatch/clean & jerk intermission,
    /// referees reminded after 30 s.
    pub fn competition() -> Self {
        let mut cfg = Self::default();
        cfg.timer.snatch_cj_break_ms = Some(600_000);
        cfg.decision.referee_timeout_ms = Some(30_000);
        cfg.decision.timeout_policy = RefereeTimeoutPolicy::Notify;
        cfg
    }

    /// Short delays for rehearsals and automated runs.
    pub fn testing() -> Self {
        let mut cfg = Self::default();
        cfg.timer.tick_ms = 10;
        cfg.decision.grace_ms = 500;
        cfg.decision.display_ms = 500;
        cfg
    }

    pub fn from_env_or_default() -> Self {
        match env::var("WL_ENGINE_PROFILE").unwrap_or_default().to_lowercase().as_str() {
            "competition" => Self::competition(),
            "testing" => Self::testing(),
            _ => Self::default(),
        }
    }

    /// Parse and validate YAML; missing sections fall back to defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}
