use rand::Rng;
use rand::distr::Distribution;
use serde::{Deserialize, Serialize};

use crate::Int;
use crate::error::{Error, Result, invalid};

/// Signed inventory adjustment chosen by the agent for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Action(pub Int);

/// Inclusive range of discrete actions, mapped onto zero-based table columns
/// with `min` at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSpace {
    pub min: Int,
    pub max: Int,
}

impl Default for ActionSpace {
    fn default() -> Self {
        ActionSpace { min: -5, max: 5 }
    }
}

impl ActionSpace {
    pub fn new(min: Int, max: Int) -> Result<Self> {
        if min > max {
            return invalid(format!("empty action range [{min}, {max}]"));
        }
        Ok(ActionSpace { min, max })
    }

    pub fn len(&self) -> usize {
        (self.max as i64 - self.min as i64 + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, action: Action) -> bool {
        (self.min..=self.max).contains(&action.0)
    }

    /// Column of `action` in the Q-table.
    pub fn index(&self, action: Action) -> Result<usize> {
        if !self.contains(action) {
            return Err(Error::Index {
                what: "action",
                index: (action.0 as i64 - self.min as i64).max(0) as usize,
                len: self.len(),
            });
        }
        Ok((action.0 as i64 - self.min as i64) as usize)
    }

    pub fn action(&self, index: usize) -> Result<Action> {
        if index >= self.len() {
            return Err(Error::Index {
                what: "action",
                index,
                len: self.len(),
            });
        }
        Ok(Action(self.min + index as Int))
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> {
        (self.min..=self.max).map(Action)
    }
}

impl Distribution<Action> for ActionSpace {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        Action(rng.random_range(self.min..=self.max))
    }
}
