//! Reel CLI - drive tween timelines without a host application
//!
//! Loads a scenario (channels, timelines, and timed control steps), ticks a
//! scheduler with a fixed clock, and prints the sampled channel values.

mod runner;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use reel_tween::SchedulerConfig;
use runner::{Output, Runner};
use scenario::Scenario;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Run a tween scenario headlessly
#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(about = "Drive tween timelines from a scenario file and print channel values")]
#[command(version)]
struct Args {
    /// Scenario file (.toml or .json)
    scenario: PathBuf,

    /// Scheduler configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the scenario's frame count
    #[arg(long)]
    frames: Option<u32>,

    /// Override the scenario's seconds per frame
    #[arg(long)]
    dt: Option<f32>,

    /// Print every Nth frame
    #[arg(long, default_value = "1")]
    every: u32,

    /// Print one JSON object per sampled frame
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;
    let scenario = Scenario::load(&args.scenario)?;

    let frames = args.frames.unwrap_or(scenario.frames);
    let dt = args.dt.unwrap_or(scenario.dt);
    if !dt.is_finite() || dt <= 0.0 {
        anyhow::bail!("--dt must be a positive number of seconds, got {}", dt);
    }

    tracing::info!(
        "Running {} ({} frames at {:.4}s)",
        args.scenario.display(),
        frames,
        dt
    );

    let output = if args.json { Output::Json } else { Output::Text };

    let mut runner = Runner::new(config, scenario)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    runner.run(frames, dt, args.every, output, &mut out)?;
    out.flush()?;

    runner.finish()
}

/// Scheduler config from a TOML file, or defaults
fn load_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    let Some(path) = path else {
        return Ok(SchedulerConfig::default());
    };

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: SchedulerConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid config {}", path.display()))?;

    Ok(config)
}
