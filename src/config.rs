use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, invalid, io_at};
use crate::learning::action::ActionSpace;
use crate::learning::q_learning::AgentParams;
use crate::learning::reward::RewardConfig;
use crate::learning::state::StateSpace;
use crate::{INVENTORY_BINS, Int};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: EnvConfig,
    pub reward: RewardConfig,
    pub agent: AgentConfig,
    pub training: TrainingConfig,
}

/// Inventory dynamics.
///
/// `max_inventory` is the cap in the same units as the trace: 1.0 for a
/// min-max normalised trace, or the raw capacity (e.g. 500 units) for a raw
/// trace. One action unit moves inventory by `max_inventory / action_divisor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub max_days: usize,
    pub max_inventory: f64,
    pub inventory_bins: usize,
    pub action_divisor: f64,
    /// Half-width of the uniform multiplicative demand noise band. Zero disables noise.
    pub demand_noise: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            max_days: 50,
            max_inventory: 1.0,
            inventory_bins: INVENTORY_BINS,
            action_divisor: 100.0,
            demand_noise: 0.05,
            seed: None,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_days == 0 {
            return invalid("max_days must be positive");
        }
        if !(self.max_inventory.is_finite() && self.max_inventory > 0.0) {
            return invalid(format!("max_inventory must be positive, got {}", self.max_inventory));
        }
        if self.inventory_bins == 0 {
            return invalid("inventory_bins must be positive");
        }
        if !(self.action_divisor.is_finite() && self.action_divisor > 0.0) {
            return invalid(format!("action_divisor must be positive, got {}", self.action_divisor));
        }
        if !(0.0..1.0).contains(&self.demand_noise) {
            return invalid(format!("demand_noise must lie in [0, 1), got {}", self.demand_noise));
        }
        Ok(())
    }

    /// The encoded state space implied by this configuration.
    pub fn state_space(&self) -> StateSpace {
        StateSpace::new(self.max_days, self.inventory_bins)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
    pub action_min: Int,
    pub action_max: Int,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let params = AgentParams::default();
        let actions = ActionSpace::default();
        AgentConfig {
            alpha: params.alpha,
            gamma: params.gamma,
            epsilon: params.epsilon,
            epsilon_min: params.epsilon_min,
            epsilon_decay: params.epsilon_decay,
            action_min: actions.min,
            action_max: actions.max,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn params(&self) -> AgentParams {
        AgentParams {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.epsilon,
            epsilon_min: self.epsilon_min,
            epsilon_decay: self.epsilon_decay,
            seed: self.seed,
        }
    }

    pub fn action_space(&self) -> Result<ActionSpace> {
        ActionSpace::new(self.action_min, self.action_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            episodes: 1000,
            log_every: 100,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| io_at(path, e))?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.environment.validate()?;
        self.reward.validate()?;
        self.agent.params().validate()?;
        self.agent.action_space()?;
        if self.training.log_every == 0 {
            return invalid("log_every must be positive");
        }
        Ok(())
    }
}
