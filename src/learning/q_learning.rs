use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, invalid, io_at};
use crate::learning::action::{Action, ActionSpace};
use crate::learning::q_table::QTable;
use crate::learning::reward::Reward;
use crate::learning::state::{EncodedState, StateSpace};

/// Hyper-parameters of the tabular Q-learning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    /// Learning rate, in (0, 1].
    pub alpha: f64,
    /// Discount factor, in [0, 1].
    pub gamma: f64,
    /// Initial exploration rate, in [epsilon_min, 1].
    pub epsilon: f64,
    pub epsilon_min: f64,
    /// Applied once per `learn` call, in (0, 1].
    pub epsilon_decay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AgentParams {
    fn default() -> Self {
        AgentParams {
            alpha: 0.1,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            seed: None,
        }
    }
}

impl AgentParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return invalid(format!("alpha must lie in (0, 1], got {}", self.alpha));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must lie in [0, 1], got {}", self.gamma));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) {
            return invalid(format!("epsilon_min must lie in [0, 1], got {}", self.epsilon_min));
        }
        if !(self.epsilon_min..=1.0).contains(&self.epsilon) {
            return invalid(format!(
                "epsilon must lie in [epsilon_min, 1] = [{}, 1], got {}",
                self.epsilon_min, self.epsilon
            ));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return invalid(format!(
                "epsilon_decay must lie in (0, 1], got {}",
                self.epsilon_decay
            ));
        }
        Ok(())
    }
}

/// On-disk form of a trained agent.
#[derive(Debug, Serialize, Deserialize)]
struct SavedModel {
    actions: ActionSpace,
    params: AgentParams,
    epsilon: f64,
    q_table: QTable,
}

/// Epsilon-greedy tabular Q-learning agent.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q_table: QTable,
    actions: ActionSpace,
    params: AgentParams,
    epsilon: f64,
    rng: StdRng,
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

impl QLearningAgent {
    pub fn new(n_states: usize, actions: ActionSpace, params: AgentParams) -> Result<Self> {
        params.validate()?;
        if n_states == 0 {
            return invalid("state space size must be positive");
        }
        if actions.is_empty() {
            return invalid("action space must be non-empty");
        }
        info!(
            "Q-learning agent: {} states x {} actions [{}, {}]",
            n_states,
            actions.len(),
            actions.min,
            actions.max
        );
        Ok(QLearningAgent {
            q_table: QTable::zeros(n_states, actions.len()),
            actions,
            epsilon: params.epsilon,
            rng: make_rng(params.seed),
            params,
        })
    }

    /// Builds an agent whose table exactly covers `space`.
    pub fn from_space(space: &StateSpace, actions: ActionSpace, params: AgentParams) -> Result<Self> {
        space.validate()?;
        QLearningAgent::new(space.size(), actions, params)
    }

    /// Fails if some state `space` can encode has no row in the table.
    pub fn ensure_covers(&self, space: &StateSpace) -> Result<()> {
        if self.q_table.n_states() < space.size() {
            return Err(Error::Index {
                what: "state space",
                index: space.size() - 1,
                len: self.q_table.n_states(),
            });
        }
        Ok(())
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn actions(&self) -> ActionSpace {
        self.actions
    }

    pub fn params(&self) -> &AgentParams {
        &self.params
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Overrides the current exploration rate. Lowers `epsilon_min` if needed
    /// so decay can never raise epsilon back up.
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&epsilon) {
            return invalid(format!("epsilon must lie in [0, 1], got {epsilon}"));
        }
        self.epsilon = epsilon;
        self.params.epsilon_min = self.params.epsilon_min.min(epsilon);
        Ok(())
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Result<Self> {
        self.set_epsilon(epsilon)?;
        Ok(self)
    }

    pub fn greedy_action(&self, state: EncodedState) -> Result<Action> {
        let idx = self.q_table.best_index(state)?;
        self.actions.action(idx)
    }

    pub fn choose_action(&mut self, state: EncodedState) -> Result<Action> {
        let greedy = self.greedy_action(state)?;
        if self.rng.random::<f64>() < self.epsilon {
            return Ok(self.actions.sample(&mut self.rng));
        }
        Ok(greedy)
    }

    /// One-step Q-learning update towards `reward + gamma * max_a' Q[next_state, a']`,
    /// followed by one epsilon decay.
    pub fn learn(
        &mut self,
        state: EncodedState,
        action: Action,
        reward: Reward,
        next_state: EncodedState,
    ) -> Result<()> {
        let idx = self.actions.index(action)?;
        let q = self.q_table.get(state, idx)?;
        let target = reward.val + self.params.gamma * self.q_table.max_value(next_state)?;
        let updated = q + self.params.alpha * (target - q);
        self.q_table.set(state, idx, updated)?;
        debug!(
            "learn: s={} a={} r={:.3} s'={} Q {:.4} -> {:.4}",
            state, action.0, reward.val, next_state, q, updated
        );

        self.epsilon = (self.epsilon * self.params.epsilon_decay).max(self.params.epsilon_min);
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let model = SavedModel {
            actions: self.actions,
            params: self.params.clone(),
            epsilon: self.epsilon,
            q_table: self.q_table.clone(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &model).map_err(std::io::Error::from)?;
        writer.flush()?;
        info!(
            "Saved Q-table ({} x {}) to {}",
            self.q_table.n_states(),
            self.q_table.n_actions(),
            path.display()
        );
        Ok(())
    }

    /// Restores an agent from `path`; its dimensions come from the stored table.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_at(path, e))?;
        let model: SavedModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::CorruptData(format!("{}: {e}", path.display())))?;

        model
            .params
            .validate()
            .map_err(|e| Error::CorruptData(format!("{}: {e}", path.display())))?;
        if model.actions.len() != model.q_table.n_actions() {
            return Err(Error::CorruptData(format!(
                "{}: action range [{}, {}] does not match {} table columns",
                path.display(),
                model.actions.min,
                model.actions.max,
                model.q_table.n_actions()
            )));
        }
        // Decay floors at epsilon_min, so a stored epsilon below it would rise on the next update.
        if !(model.params.epsilon_min..=1.0).contains(&model.epsilon) {
            return Err(Error::CorruptData(format!(
                "{}: stored epsilon {} outside [epsilon_min, 1] = [{}, 1]",
                path.display(),
                model.epsilon,
                model.params.epsilon_min
            )));
        }
        info!(
            "Loaded Q-table ({} x {}) from {}",
            model.q_table.n_states(),
            model.q_table.n_actions(),
            path.display()
        );
        Ok(QLearningAgent {
            rng: make_rng(model.params.seed),
            q_table: model.q_table,
            actions: model.actions,
            params: model.params,
            epsilon: model.epsilon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn params(epsilon: f64) -> AgentParams {
        AgentParams {
            alpha: 0.5,
            gamma: 0.9,
            epsilon,
            epsilon_min: 0.0,
            epsilon_decay: 0.9,
            seed: Some(42),
        }
    }

    fn make_agent(n_states: usize, epsilon: f64) -> QLearningAgent {
        QLearningAgent::new(n_states, ActionSpace::default(), params(epsilon)).unwrap()
    }

    #[test]
    fn test_new_validates_params() {
        let space = ActionSpace::default();
        let bad = [
            AgentParams { alpha: 0.0, ..params(0.5) },
            AgentParams { alpha: 1.5, ..params(0.5) },
            AgentParams { gamma: -0.1, ..params(0.5) },
            AgentParams { epsilon_decay: 0.0, ..params(0.5) },
            AgentParams { epsilon_min: 0.6, ..params(0.5) },
        ];
        for p in bad {
            assert!(matches!(
                QLearningAgent::new(10, space, p),
                Err(Error::InvalidConfiguration(_))
            ));
        }
        assert!(QLearningAgent::new(0, space, params(0.5)).is_err());
    }

    #[test]
    fn test_ensure_covers() {
        let agent = make_agent(499, 0.0);
        assert!(matches!(
            agent.ensure_covers(&StateSpace::new(5, 100)),
            Err(Error::Index { .. })
        ));
        assert!(agent.ensure_covers(&StateSpace::new(4, 100)).is_ok());

        let space = StateSpace::new(5, 100);
        let agent = QLearningAgent::from_space(&space, ActionSpace::default(), params(0.0)).unwrap();
        assert!(agent.ensure_covers(&space).is_ok());
        assert_eq!(agent.q_table().n_states(), 500);
    }

    #[test]
    fn test_greedy_tie_break_and_range_check() {
        let mut agent = make_agent(10, 0.0);
        for state in 0..10 {
            assert_eq!(agent.choose_action(state).unwrap(), Action(-5));
        }
        assert!(matches!(agent.choose_action(10), Err(Error::Index { .. })));
    }

    #[test]
    fn test_full_exploration_covers_actions() {
        let mut agent = make_agent(1, 1.0);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(agent.choose_action(0).unwrap());
        }
        assert_eq!(seen.len(), 11);
    }

    #[test]
    fn test_learn_moves_towards_target() {
        let mut agent = make_agent(3, 0.0);
        agent.q_table.set(1, 2, 4.0).unwrap();
        agent.q_table.set(1, 7, -3.0).unwrap();
        agent.q_table.set(0, 5, 1.0).unwrap();

        // Target bootstraps from the greedy value of the next state.
        let target = 2.0 + 0.9 * 4.0;
        agent.learn(0, Action(0), Reward::new(2.0), 1).unwrap();
        let q = agent.q_table.get(0, 5).unwrap();
        assert!(q > 1.0 && q <= target);
        assert!((q - (1.0 + 0.5 * (target - 1.0))).abs() < 1e-12);

        // alpha = 1 lands exactly on the target and never past it.
        let mut agent = QLearningAgent::new(
            3,
            ActionSpace::default(),
            AgentParams { alpha: 1.0, ..params(0.0) },
        )
        .unwrap();
        agent.q_table.set(0, 0, 10.0).unwrap();
        agent.learn(0, Action(-5), Reward::new(-1.0), 2).unwrap();
        assert_eq!(agent.q_table.get(0, 0).unwrap(), -1.0);
    }

    #[test]
    fn test_learn_rejects_out_of_range() {
        let mut agent = make_agent(3, 0.0);
        assert!(agent.learn(3, Action(0), Reward::new(1.0), 0).is_err());
        assert!(agent.learn(0, Action(0), Reward::new(1.0), 3).is_err());
        assert!(agent.learn(0, Action(6), Reward::new(1.0), 0).is_err());
    }

    #[test]
    fn test_epsilon_decay_is_monotone_and_floored() {
        let mut agent = QLearningAgent::new(
            2,
            ActionSpace::default(),
            AgentParams {
                epsilon: 1.0,
                epsilon_min: 0.2,
                epsilon_decay: 0.8,
                ..params(1.0)
            },
        )
        .unwrap();
        let mut prev = agent.epsilon();
        for _ in 0..50 {
            agent.learn(0, Action(0), Reward::new(1.0), 1).unwrap();
            assert!(agent.epsilon() <= prev);
            assert!(agent.epsilon() >= 0.2);
            prev = agent.epsilon();
        }
        assert_eq!(agent.epsilon(), 0.2);
    }

    #[test]
    fn test_set_epsilon_below_floor_stays_put() {
        let mut agent = QLearningAgent::new(2, ActionSpace::default(), AgentParams::default())
            .unwrap()
            .with_epsilon(0.0)
            .unwrap();
        agent.learn(0, Action(0), Reward::new(1.0), 1).unwrap();
        assert_eq!(agent.epsilon(), 0.0);
        assert!(agent.set_epsilon(1.5).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new("restock").unwrap();
        let path = dir.path().join("models").join("agent.json");

        let mut agent = make_agent(40, 1.0);
        for step in 0..400 {
            let state = step % 40;
            let action = agent.choose_action(state).unwrap();
            let reward = Reward::new(((step * 7919) % 13) as f64 / 3.0 - 2.0);
            agent.learn(state, action, reward, (state + 1) % 40).unwrap();
        }
        agent.save(&path).unwrap();

        let loaded = QLearningAgent::load(&path).unwrap();
        assert_eq!(loaded.q_table(), agent.q_table());
        assert_eq!(loaded.actions(), agent.actions());
        assert_eq!(loaded.epsilon(), agent.epsilon());

        let mut loaded = loaded.with_epsilon(0.0).unwrap();
        let mut agent = agent.with_epsilon(0.0).unwrap();
        for state in 0..40 {
            assert_eq!(loaded.choose_action(state).unwrap(), agent.choose_action(state).unwrap());
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new("restock").unwrap();
        assert!(matches!(
            QLearningAgent::load(dir.path().join("nope.json")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new("restock").unwrap();

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not a model").unwrap();
        assert!(matches!(QLearningAgent::load(&garbage), Err(Error::CorruptData(_))));

        let ragged = dir.path().join("ragged.json");
        let text = r#"{"actions":{"min":0,"max":1},
            "params":{"alpha":0.1,"gamma":0.9,"epsilon":0.5,"epsilon_min":0.0,"epsilon_decay":0.9},
            "epsilon":0.5,"q_table":[[0.0,1.0],[2.0]]}"#;
        std::fs::write(&ragged, text).unwrap();
        assert!(matches!(QLearningAgent::load(&ragged), Err(Error::CorruptData(_))));

        let mismatched = dir.path().join("mismatched.json");
        let text = r#"{"actions":{"min":0,"max":2},
            "params":{"alpha":0.1,"gamma":0.9,"epsilon":0.5,"epsilon_min":0.0,"epsilon_decay":0.9},
            "epsilon":0.5,"q_table":[[0.0,1.0],[2.0,3.0]]}"#;
        std::fs::write(&mismatched, text).unwrap();
        assert!(matches!(QLearningAgent::load(&mismatched), Err(Error::CorruptData(_))));

        let below_floor = dir.path().join("below_floor.json");
        let text = r#"{"actions":{"min":0,"max":1},
            "params":{"alpha":0.1,"gamma":0.9,"epsilon":0.5,"epsilon_min":0.5,"epsilon_decay":0.9},
            "epsilon":0.0,"q_table":[[0.0,1.0],[2.0,3.0]]}"#;
        std::fs::write(&below_floor, text).unwrap();
        assert!(matches!(QLearningAgent::load(&below_floor), Err(Error::CorruptData(_))));
    }

    #[test]
    fn test_loaded_epsilon_never_rises() {
        let dir = TempDir::new("restock").unwrap();
        let path = dir.path().join("floor.json");
        let text = r#"{"actions":{"min":0,"max":1},
            "params":{"alpha":0.1,"gamma":0.9,"epsilon":0.5,"epsilon_min":0.5,"epsilon_decay":0.9},
            "epsilon":0.5,"q_table":[[0.0,1.0],[2.0,3.0]]}"#;
        std::fs::write(&path, text).unwrap();

        let mut agent = QLearningAgent::load(&path).unwrap();
        let before = agent.epsilon();
        agent.learn(0, Action(1), Reward::new(1.0), 1).unwrap();
        assert!(agent.epsilon() <= before);
        assert_eq!(agent.epsilon(), 0.5);
    }
}
