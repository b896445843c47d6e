use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::Int;
use crate::config::Config;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::learning::q_learning::QLearningAgent;
use crate::trace::Trace;

/// An environment paired with the agent acting in it.
#[derive(Debug)]
pub struct Simulation {
    pub env: Environment,
    pub agent: QLearningAgent,
    pub log_every: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub total_reward: f64,
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub episode_rewards: Vec<f64>,
    pub cancelled: bool,
}

/// One day of a recorded rollout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub day: usize,
    pub inventory_before: f64,
    pub inventory_after: f64,
    pub action: Int,
    pub reward: f64,
    pub demand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_reward: f64,
    /// Percentage of days with strictly positive reward.
    pub positive_reward_rate: f64,
    pub mean_inventory_after: f64,
    pub total_actions: usize,
    pub average_action: f64,
}

impl Metrics {
    pub fn from_records(records: &[StepRecord]) -> Metrics {
        if records.is_empty() {
            return Metrics::default();
        }
        let n = records.len() as f64;
        Metrics {
            total_reward: records.iter().map(|r| r.reward).sum(),
            positive_reward_rate: records.iter().filter(|r| r.reward > 0.0).count() as f64 / n
                * 100.0,
            mean_inventory_after: records.iter().map(|r| r.inventory_after).sum::<f64>() / n,
            total_actions: records.len(),
            average_action: records.iter().map(|r| r.action as f64).sum::<f64>() / n,
        }
    }
}

#[derive(Debug, Serialize)]
struct EpisodeRow {
    episode: usize,
    total_reward: f64,
}

impl Simulation {
    /// Builds the environment and a fresh agent from one shared state space.
    pub fn new(trace: Trace, config: &Config) -> Result<Self> {
        config.validate()?;
        let space = config.environment.state_space();
        let agent = QLearningAgent::from_space(
            &space,
            config.agent.action_space()?,
            config.agent.params(),
        )?;
        Simulation::with_agent(trace, config, agent)
    }

    /// Pairs an existing (e.g. loaded) agent with a new environment.
    pub fn with_agent(trace: Trace, config: &Config, agent: QLearningAgent) -> Result<Self> {
        let space = config.environment.state_space();
        agent.ensure_covers(&space)?;
        let env = Environment::new(
            trace,
            space,
            config.environment.clone(),
            config.reward.clone(),
        )?;
        Ok(Simulation {
            env,
            agent,
            log_every: config.training.log_every.max(1),
        })
    }

    /// Pairs a saved agent with a new environment for greedy runs. A missing or
    /// corrupt model is logged and replaced by an untrained agent; both end up
    /// with epsilon 0.
    pub fn load_or_fresh<P: AsRef<Path>>(trace: Trace, config: &Config, model: P) -> Result<Self> {
        match QLearningAgent::load(model.as_ref()) {
            Ok(agent) => Simulation::with_agent(trace, config, agent.with_epsilon(0.0)?),
            Err(e @ (Error::NotFound(_) | Error::CorruptData(_))) => {
                warn!("Could not load agent ({e}); using an untrained agent");
                let mut sim = Simulation::new(trace, config)?;
                sim.agent.set_epsilon(0.0)?;
                Ok(sim)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs one episode from `reset` to `done`. With `learn`, the agent explores
    /// and updates after every step; otherwise it acts greedily and is left untouched.
    pub fn run_episode(&mut self, learn: bool) -> Result<EpisodeSummary> {
        let mut state = self.env.reset();
        let mut summary = EpisodeSummary {
            total_reward: 0.0,
            steps: 0,
        };
        loop {
            let action = if learn {
                self.agent.choose_action(state)?
            } else {
                self.agent.greedy_action(state)?
            };
            let transition = self.env.step(action)?;
            if learn {
                self.agent
                    .learn(state, action, transition.reward, transition.state)?;
            }
            summary.total_reward += transition.reward.val;
            summary.steps += 1;
            state = transition.state;
            if transition.done {
                return Ok(summary);
            }
        }
    }

    /// Trains for up to `episodes` episodes. `cancel` is checked between episodes.
    pub fn train(&mut self, episodes: usize, cancel: Option<&AtomicBool>) -> Result<TrainingReport> {
        info!("Training for {} episodes", episodes);
        let mut report = TrainingReport::default();
        for episode in 0..episodes {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                warn!("Training cancelled after {} of {} episodes", episode, episodes);
                report.cancelled = true;
                break;
            }
            let summary = self.run_episode(true)?;
            report.episode_rewards.push(summary.total_reward);
            debug!(
                "Episode {}: reward {:.2}, epsilon {:.4}",
                episode + 1,
                summary.total_reward,
                self.agent.epsilon()
            );
            if (episode + 1) % self.log_every == 0 {
                let window = &report.episode_rewards[report.episode_rewards.len() - self.log_every..];
                info!(
                    "Episode {}/{}: reward {:.2}, avg. reward {:.2}, epsilon {:.4}",
                    episode + 1,
                    episodes,
                    summary.total_reward,
                    window.iter().sum::<f64>() / window.len() as f64,
                    self.agent.epsilon()
                );
            }
        }
        info!("Training completed after {} episodes", report.episode_rewards.len());
        Ok(report)
    }

    /// One greedy episode without learning.
    pub fn evaluate(&mut self) -> Result<EpisodeSummary> {
        let summary = self.run_episode(false)?;
        info!("Test completed - total reward: {:.2}", summary.total_reward);
        Ok(summary)
    }

    /// Greedy rollout recording every day.
    pub fn simulate(&mut self) -> Result<Vec<StepRecord>> {
        let mut state = self.env.reset();
        let mut records = Vec::with_capacity(self.env.horizon());
        loop {
            let day = self.env.current_day();
            let inventory_before = self.env.inventory_level();
            let action = self.agent.greedy_action(state)?;
            let after_adjustment = inventory_before + self.env.adjustment(action);
            let transition = self.env.step(action)?;
            records.push(StepRecord {
                day,
                inventory_before,
                inventory_after: after_adjustment.clamp(0.0, self.env.max_inventory()),
                action: action.0,
                reward: transition.reward.val,
                demand: self.env.last_demand().unwrap_or(0.0),
            });
            state = transition.state;
            if transition.done {
                return Ok(records);
            }
        }
    }
}

pub fn write_rewards_csv<P: AsRef<Path>>(path: P, rewards: &[f64]) -> Result<()> {
    let mut writer = csv_writer(path.as_ref())?;
    for (episode, total_reward) in rewards.iter().enumerate() {
        writer.serialize(EpisodeRow {
            episode: episode + 1,
            total_reward: *total_reward,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_records_csv<P: AsRef<Path>>(path: P, records: &[StepRecord]) -> Result<()> {
    let mut writer = csv_writer(path.as_ref())?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}
