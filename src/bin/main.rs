use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use restock::config::Config;
use restock::error::Result;
use restock::simulation::{Metrics, Simulation, write_records_csv, write_rewards_csv};
use restock::trace::Trace;

#[derive(Parser)]
#[command(author, version, about = "Train and run a Q-learning inventory replenishment agent", long_about = None)]
struct Cli {
    /// TOML config; built-in defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent and save its Q-table
    Train {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value = "models/trained_rl_agent.json")]
        model: PathBuf,
        /// Overrides `training.episodes`
        #[arg(long)]
        episodes: Option<usize>,
        /// Per-episode total rewards
        #[arg(long, default_value = "models/training_rewards.csv")]
        rewards: PathBuf,
    },
    /// Run one greedy episode and print the total reward
    Test {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value = "models/trained_rl_agent.json")]
        model: PathBuf,
    },
    /// Greedy rollout with per-day records and summary metrics
    Simulate {
        #[arg(long)]
        data: PathBuf,
        #[arg(long, default_value = "models/trained_rl_agent.json")]
        model: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a synthetic daily trace
    Generate {
        #[arg(long, default_value = "50")]
        days: usize,
        #[arg(long, default_value = "data/synthetic_supply_chain_data.csv")]
        out: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Min-max scale the columns to [0, 1]
        #[arg(long)]
        normalize: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            data,
            model,
            episodes,
            rewards,
        } => {
            let trace = Trace::from_csv(&data)?;
            let mut sim = Simulation::new(trace, &config)?;
            let report = sim.train(episodes.unwrap_or(config.training.episodes), None)?;
            sim.agent.save(&model)?;
            write_rewards_csv(&rewards, &report.episode_rewards)?;
            info!("Rewards written to {}", rewards.display());
            if let Some(last) = report.episode_rewards.last() {
                println!("Final episode reward: {last:.2}");
            }
        }
        Commands::Test { data, model } => {
            let trace = Trace::from_csv(&data)?;
            let mut sim = Simulation::load_or_fresh(trace, &config, &model)?;
            let summary = sim.evaluate()?;
            println!("Test Completed - Total Reward: {:.2}", summary.total_reward);
        }
        Commands::Simulate { data, model, out } => {
            let trace = Trace::from_csv(&data)?;
            let mut sim = Simulation::load_or_fresh(trace, &config, &model)?;
            let records = sim.simulate()?;
            if let Some(out) = out {
                write_records_csv(&out, &records)?;
                info!("Per-day records written to {}", out.display());
            }
            let metrics = Metrics::from_records(&records);
            println!("Total Reward: {:.2}", metrics.total_reward);
            println!("Positive Reward Rate (%): {:.1}", metrics.positive_reward_rate);
            println!("Mean Inventory Level: {:.4}", metrics.mean_inventory_after);
            println!("Total Actions Taken: {}", metrics.total_actions);
            println!("Average Action Adjustment: {:.2}", metrics.average_action);
        }
        Commands::Generate {
            days,
            out,
            seed,
            normalize,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let trace = Trace::synthetic(days, &mut rng)?;
            let trace = if normalize { trace.normalized() } else { trace };
            trace.write_csv(&out)?;
            println!("Synthetic trace of {} days saved to {}", trace.len(), out.display());
        }
    }
    Ok(())
}
