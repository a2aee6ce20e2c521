/*
 * wordflock
 *
 * Runs a flocking scenario either headless, logging cluster statistics as it
 * goes, or in an interactive viewer. Scenarios are TOML files; without one the
 * built-in default flock is used.
 *
 * Logging goes through tracing; set RUST_LOG to change the filter.
 */

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wordflock::app;
use wordflock::cluster::{Cluster, ClusterTracker};
use wordflock::config::SimConfig;
use wordflock::simulation::Simulation;

#[derive(Parser, Debug)]
#[command(name = "wordflock")]
#[command(about = "Flocking agents that gather into word clusters", long_about = None)]
struct Args {
    /// Scenario file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run without a window and exit after --ticks steps
    #[arg(long)]
    headless: bool,

    /// Number of steps to run in headless mode
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Step length in seconds for headless mode (defaults to the scenario's step rate)
    #[arg(long)]
    dt: Option<f32>,

    /// Override the scenario's RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wordflock=info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading scenario");
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    // Reject a broken scenario before any window opens
    let sim = Simulation::from_config(&config)?;

    if args.headless {
        let dt = args.dt.unwrap_or_else(|| sim.step_size().as_secs_f32());
        if !dt.is_finite() || dt <= 0.0 {
            return Err(format!("--dt must be positive, got {dt}").into());
        }
        run_headless(sim, &config, args.ticks, dt);
    } else {
        drop(sim);
        app::run(config);
    }
    Ok(())
}

fn run_headless(mut sim: Simulation, config: &SimConfig, ticks: u64, dt: f32) {
    let mut tracker = ClusterTracker::new(config.stable_pass_threshold);
    let log_every = (ticks / 10).max(1);
    let mut rejected = 0;

    info!(ticks, dt, agents = sim.agent_count(), "headless run started");

    for _ in 0..ticks {
        let report = sim.step(dt);
        rejected += report.flocks.rejected;

        let clusters = sim.build_clusters();
        let tracked = tracker.observe(&clusters);

        if report.tick % log_every == 0 || report.tick == ticks {
            info!(
                tick = report.tick,
                agents = report.agents,
                clusters = clusters.len(),
                stable = tracked.stable.len(),
                largest = clusters.iter().map(Cluster::len).max().unwrap_or(0),
                "progress"
            );
        }
    }

    info!(ticks = sim.tick(), rejected_forces = rejected, "headless run finished");
}
