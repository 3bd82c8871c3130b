mod batch;
mod choice;
mod chromosome;
mod config;
mod engine;
mod genome;
mod instance;
mod manager;
mod metrics;
mod model;
mod neighbor;
mod params;
mod policy;
mod problem;
mod search;
mod stats;
mod utils;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Simulate,

    Calibrate,

    Policy {
        #[arg(long)]
        destination: usize,

        #[arg(long)]
        start: usize,

        #[arg(long)]
        end: usize,

        #[arg(long, value_delimiter = ',')]
        levels: Vec<f64>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Simulate => mgr.simulate()?,
        Command::Calibrate => mgr.calibrate()?,
        Command::Policy {
            destination,
            start,
            end,
            levels,
        } => mgr.evaluate_policy(destination, start, end, &levels)?,
        Command::Clean => mgr.clean()?,
    }

    Ok(())
}
