//! Fracture Net - Entry Point
//!
//! Loads a generation config, runs the generator, and writes the network as
//! JSON. With `--interactive`, `pause`, `resume` and `stop` typed on stdin
//! control the running job.

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fracture_net::core::config::GenerationConfig;
use fracture_net::core::error::Result;
use fracture_net::generation::{ControlFlag, DfnGenerator};
use fracture_net::output::RetentionPolicy;

/// Generate a three-dimensional discrete fracture network
#[derive(Parser, Debug)]
#[command(name = "fracture-net")]
#[command(about = "Generate a stochastic discrete fracture network")]
struct Args {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the configured random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the retained network as JSON to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Keep only shapes that intersect at least one other
    #[arg(long)]
    remove_isolated: bool,

    /// Keep only the largest cluster
    #[arg(long)]
    largest_cluster_only: bool,

    /// Keep only clusters spanning the configured boundary faces
    #[arg(long)]
    percolating_only: bool,

    /// Drop shapes with a radius below this
    #[arg(long, default_value_t = 0.0)]
    min_radius: f64,

    /// Read pause/resume/stop commands from stdin while generating
    #[arg(long)]
    interactive: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn spawn_stdin_control(flag: ControlFlag) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "pause" | "p" => flag.pause(),
                "resume" | "r" => flag.resume(),
                "stop" | "s" => {
                    flag.stop();
                    break;
                }
                other => tracing::warn!("Unknown command '{}': use pause, resume or stop", other),
            }
        }
    });
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "fracture_net=debug" } else { "fracture_net=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let mut config = match &args.config {
        Some(path) => GenerationConfig::from_toml_file(path)?,
        None => GenerationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let flag = ControlFlag::new();
    if args.interactive {
        spawn_stdin_control(flag.clone());
    }
    let generator = DfnGenerator::new(config)?.with_control(flag);
    let output = generator.run()?;

    let policy = RetentionPolicy {
        keep_isolated: !args.remove_isolated,
        largest_cluster_only: args.largest_cluster_only,
        percolating_only: args.percolating_only,
        min_radius: args.min_radius,
    };
    let retained = output.retain(policy);

    println!("{}", output.summary());
    println!("Retained {} of {} shapes", retained.shapes.len(), output.shapes.len());
    if !output.status.is_complete() {
        tracing::warn!("Generation ended early: {:?}", output.status);
    }

    if let Some(path) = &args.output {
        fs::write(path, retained.to_json())?;
        tracing::info!("Wrote network to {}", path.display());
    }
    Ok(())
}
