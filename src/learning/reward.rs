use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::error::{Result, invalid};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Reward {
    pub val: f64,
}

impl Reward {
    pub fn new(val: f64) -> Self {
        Reward { val }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display, Serialize, Deserialize)]
pub enum RewardRegime {
    Stockout,
    Overstock,
    Efficient,
    Neutral,
}

/// Thresholds are fractions of `max_inventory`; magnitudes are reward units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub low_inventory: f64,
    pub high_demand: f64,
    pub high_inventory: f64,
    pub low_demand: f64,
    pub efficient_margin: f64,
    pub stockout_penalty: f64,
    pub overstock_penalty: f64,
    /// Charged per unit of excess inventory (as a fraction of capacity) in the overstock regime.
    pub holding_cost: f64,
    pub efficient_bonus: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            low_inventory: 0.2,
            high_demand: 0.5,
            high_inventory: 0.8,
            low_demand: 0.2,
            efficient_margin: 1.1,
            stockout_penalty: 10.0,
            overstock_penalty: 4.0,
            holding_cost: 2.0,
            efficient_bonus: 5.0,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("low_inventory", self.low_inventory),
            ("high_demand", self.high_demand),
            ("high_inventory", self.high_inventory),
            ("low_demand", self.low_demand),
        ];
        for (name, val) in thresholds {
            if !(0.0..=1.0).contains(&val) {
                return invalid(format!("{name} must lie in [0, 1], got {val}"));
            }
        }
        let magnitudes = [
            ("stockout_penalty", self.stockout_penalty),
            ("overstock_penalty", self.overstock_penalty),
            ("holding_cost", self.holding_cost),
        ];
        for (name, val) in magnitudes {
            if !(val.is_finite() && val >= 0.0) {
                return invalid(format!("{name} must be non-negative, got {val}"));
            }
        }
        if !(self.efficient_bonus.is_finite() && self.efficient_bonus > 0.0) {
            return invalid(format!(
                "efficient_bonus must be positive, got {}",
                self.efficient_bonus
            ));
        }
        if !(self.efficient_margin.is_finite() && self.efficient_margin >= 1.0) {
            return invalid(format!(
                "efficient_margin must be at least 1, got {}",
                self.efficient_margin
            ));
        }
        // The worst overstock (excess == 1) must stay milder than a stockout.
        if self.stockout_penalty <= self.overstock_penalty + self.holding_cost {
            return invalid(format!(
                "stockout_penalty ({}) must exceed overstock_penalty + holding_cost ({})",
                self.stockout_penalty,
                self.overstock_penalty + self.holding_cost
            ));
        }
        Ok(())
    }

    pub fn regime(&self, inventory: f64, demand: f64, max_inventory: f64) -> RewardRegime {
        let inv_frac = inventory / max_inventory;
        let demand_frac = demand / max_inventory;
        if inv_frac < self.low_inventory && demand_frac > self.high_demand {
            RewardRegime::Stockout
        } else if inv_frac > self.high_inventory && demand_frac < self.low_demand {
            RewardRegime::Overstock
        } else if inventory > 0.0 && inventory >= demand * self.efficient_margin {
            RewardRegime::Efficient
        } else {
            RewardRegime::Neutral
        }
    }

    /// Reward for holding `inventory` (post-adjustment) against `demand`.
    pub fn reward(&self, inventory: f64, demand: f64, max_inventory: f64) -> Reward {
        let val = match self.regime(inventory, demand, max_inventory) {
            RewardRegime::Stockout => -self.stockout_penalty,
            RewardRegime::Overstock => {
                let excess = ((inventory - demand) / max_inventory).clamp(0.0, 1.0);
                -(self.overstock_penalty + self.holding_cost * excess)
            }
            RewardRegime::Efficient => self.efficient_bonus,
            RewardRegime::Neutral => 0.0,
        };
        Reward::new(val)
    }
}
