use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, invalid};

/// Row index into the Q-table.
pub type EncodedState = usize;

/// Discretisation of (inventory, day) into a single table row.
///
/// Inventory is bucketed into `inventory_bins` equal-width bins over
/// `[0, max_inventory]` and the day into `[0, horizon - 1]`, combined as
/// `day_bucket * inventory_bins + inventory_bucket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateSpace {
    pub horizon: usize,
    pub inventory_bins: usize,
}

impl StateSpace {
    pub fn new(horizon: usize, inventory_bins: usize) -> Self {
        StateSpace {
            horizon,
            inventory_bins,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 || self.inventory_bins == 0 {
            return invalid(format!(
                "state space must be non-empty, got horizon {} x {} bins",
                self.horizon, self.inventory_bins
            ));
        }
        Ok(())
    }

    /// Number of distinct encoded states.
    pub fn size(&self) -> usize {
        self.horizon * self.inventory_bins
    }

    pub fn inventory_bucket(&self, inventory: f64, max_inventory: f64) -> usize {
        let frac = (inventory / max_inventory).clamp(0.0, 1.0);
        // NaN falls through `clamp` and casts to 0.
        ((frac * self.inventory_bins as f64).floor() as usize).min(self.inventory_bins - 1)
    }

    pub fn day_bucket(&self, day: usize) -> usize {
        day.min(self.horizon - 1)
    }

    pub fn encode(&self, inventory: f64, max_inventory: f64, day: usize) -> EncodedState {
        self.day_bucket(day) * self.inventory_bins + self.inventory_bucket(inventory, max_inventory)
    }

    /// Inverse of [`StateSpace::encode`] at bucket resolution: `(day_bucket, inventory_bucket)`.
    pub fn decode(&self, state: EncodedState) -> Result<(usize, usize)> {
        if state >= self.size() {
            return Err(Error::Index {
                what: "state",
                index: state,
                len: self.size(),
            });
        }
        Ok((state / self.inventory_bins, state % self.inventory_bins))
    }
}

/// Structured snapshot of the environment at the start of a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub day: usize,
    pub inventory_level: f64,
    pub state: EncodedState,
}
