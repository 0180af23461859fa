//! Accrue simulator binary.
//!
//! Registers a seeded population, then acts as the external scheduler: every
//! tick advances a simulated clock, generates activity and settles every
//! account. Prints a JSON summary with leaderboards on exit.

mod settings;
mod sim;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::sim::{Population, Simulation, DEFAULT_TICK_SECS};

/// Accrue population simulator.
#[derive(Parser, Debug)]
#[command(name = "accrue-sim", version, about = "Drive the Accrue reward engine with a seeded population")]
struct Args {
    /// Reward parameter file (TOML, JSON or YAML). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed; equal seeds give equal runs
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Number of simulated accounts
    #[arg(long, default_value_t = 200)]
    accounts: u64,

    /// Number of scheduler ticks to run
    #[arg(long, default_value_t = 48)]
    ticks: u64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = DEFAULT_TICK_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    tick_secs: u64,

    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    tick_interval_ms: u64,

    /// Leaderboard length in the summary
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    info!("Accrue simulator v{}", env!("CARGO_PKG_VERSION"));
    let params = settings::load(args.config.as_deref()).context("failed to load configuration")?;
    info!(
        seed = args.seed,
        accounts = args.accounts,
        ticks = args.ticks,
        tick_secs = args.tick_secs,
        "sim: starting"
    );

    let population = Population { accounts: args.accounts, ..Population::default() };
    let mut sim = Simulation::new(params, args.seed, &population).context("failed to build simulation")?;

    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    for _ in 0..args.ticks {
        tokio::select! {
            _ = interval.tick() => {
                let report = sim.tick(args.tick_secs).await;
                info!(
                    now = report.now,
                    activities = report.activities,
                    settled = report.settled,
                    minted = report.minted,
                    "sim: tick"
                );
            }
            _ = &mut shutdown => {
                warn!("received Ctrl+C, stopping early");
                break;
            }
        }
    }

    let summary = sim.summary(args.top).await;
    let json = serde_json::to_string_pretty(&summary).context("failed to serialise summary")?;
    println!("{json}");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so stdout carries only the JSON summary.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
