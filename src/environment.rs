use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::EnvConfig;
use crate::error::{Error, Result, invalid};
use crate::learning::action::Action;
use crate::learning::reward::{Reward, RewardConfig};
use crate::learning::state::{EncodedState, EnvSnapshot, StateSpace};
use crate::trace::Trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Running,
    Terminal,
}

/// Result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: EncodedState,
    pub reward: Reward,
    pub done: bool,
}

/// Single-commodity inventory MDP replayed against a historical trace.
///
/// Each day the agent's action adjusts inventory, the (optionally noisy)
/// demand for that day is scored and consumed, and the next day starts from
/// the trace's own inventory baseline rather than the simulated remainder.
#[derive(Debug)]
pub struct Environment {
    trace: Trace,
    space: StateSpace,
    config: EnvConfig,
    reward: RewardConfig,
    rng: StdRng,
    status: Status,
    current_day: usize,
    inventory_level: f64,
    encoded_state: EncodedState,
    last_demand: Option<f64>,
}

impl Environment {
    /// The episode horizon is `space.horizon`, which must not exceed the trace length.
    pub fn new(
        trace: Trace,
        space: StateSpace,
        config: EnvConfig,
        reward: RewardConfig,
    ) -> Result<Self> {
        config.validate()?;
        reward.validate()?;
        space.validate()?;
        if space != config.state_space() {
            return invalid(format!(
                "state space {}x{} does not match environment config {}x{}",
                space.horizon, space.inventory_bins, config.max_days, config.inventory_bins
            ));
        }
        if trace.is_empty() {
            return invalid("trace is empty");
        }
        if space.horizon > trace.len() {
            return invalid(format!(
                "horizon of {} days exceeds trace length of {} days",
                space.horizon,
                trace.len()
            ));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        info!(
            "Environment: {} days, max inventory {}, {} states, demand noise {}",
            space.horizon,
            config.max_inventory,
            space.size(),
            config.demand_noise
        );
        let mut env = Environment {
            trace,
            space,
            config,
            reward,
            rng,
            status: Status::Running,
            current_day: 0,
            inventory_level: 0.0,
            encoded_state: 0,
            last_demand: None,
        };
        env.reset();
        Ok(env)
    }

    /// Restarts the episode at day 0 from the first record's inventory.
    pub fn reset(&mut self) -> EncodedState {
        self.current_day = 0;
        self.inventory_level = self.baseline_inventory(0);
        self.status = Status::Running;
        self.last_demand = None;
        self.encoded_state = self.encode();
        self.encoded_state
    }

    pub fn step(&mut self, action: Action) -> Result<Transition> {
        if self.status == Status::Terminal {
            return Err(Error::IllegalState(format!(
                "step called after the episode ended on day {}; call reset first",
                self.current_day
            )));
        }
        let day = self.current_day;
        let record = *self.trace.record(day).ok_or_else(|| {
            Error::IllegalState(format!("no trace record for day {day}"))
        })?;
        let max_inventory = self.config.max_inventory;

        let inventory_before = self.inventory_level;
        self.inventory_level = (self.inventory_level + self.adjustment(action)).clamp(0.0, max_inventory);

        let demand = self.noisy(record.demand);
        let reward = self.reward.reward(self.inventory_level, demand, max_inventory);
        debug!(
            "day {}: action {} inventory {:.4} -> {:.4}, demand {:.4}, transport {:.4}, {} reward {:.2}",
            day,
            action.0,
            inventory_before,
            self.inventory_level,
            demand,
            record.transport_cost,
            self.reward.regime(self.inventory_level, demand, max_inventory),
            reward.val
        );

        self.inventory_level = (self.inventory_level - demand).max(0.0);
        self.last_demand = Some(demand);

        self.current_day += 1;
        let done = self.current_day >= self.space.horizon;
        if done {
            self.status = Status::Terminal;
        } else {
            self.inventory_level = self.baseline_inventory(self.current_day);
        }

        self.encoded_state = self.encode();
        Ok(Transition {
            state: self.encoded_state,
            reward,
            done,
        })
    }

    /// Inventory change for `action`: one unit is `max_inventory / action_divisor`.
    pub fn adjustment(&self, action: Action) -> f64 {
        action.0 as f64 / self.config.action_divisor * self.config.max_inventory
    }

    fn noisy(&mut self, demand: f64) -> f64 {
        let band = self.config.demand_noise;
        if band == 0.0 {
            return demand;
        }
        demand * self.rng.random_range(1.0 - band..=1.0 + band)
    }

    fn baseline_inventory(&self, day: usize) -> f64 {
        let level = self.trace.record(day).map_or(0.0, |r| r.inventory_level);
        if level > self.config.max_inventory {
            warn!(
                "day {}: trace inventory {} exceeds max_inventory {}; clamping",
                day, level, self.config.max_inventory
            );
        }
        level.min(self.config.max_inventory)
    }

    fn encode(&self) -> EncodedState {
        self.space
            .encode(self.inventory_level, self.config.max_inventory, self.current_day)
    }

    pub fn state(&self) -> EncodedState {
        self.encoded_state
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn current_day(&self) -> usize {
        self.current_day
    }

    pub fn inventory_level(&self) -> f64 {
        self.inventory_level
    }

    /// Demand realised by the most recent `step`, if any since `reset`.
    pub fn last_demand(&self) -> Option<f64> {
        self.last_demand
    }

    pub fn max_inventory(&self) -> f64 {
        self.config.max_inventory
    }

    pub fn state_space(&self) -> StateSpace {
        self.space
    }

    pub fn horizon(&self) -> usize {
        self.space.horizon
    }

    pub fn snapshot(&self) -> EnvSnapshot {
        EnvSnapshot {
            day: self.current_day,
            inventory_level: self.inventory_level,
            state: self.encoded_state,
        }
    }
}
