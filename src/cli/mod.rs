//! Command-line front end: argument parsing and logging setup.
//!
//! Dispatch lives in [`commands`]; this module only describes the arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fedbatch_rs::model::ProductionMode;
use fedbatch_rs::strategy::{Objective, DEFAULT_HORIZON, DEFAULT_MAX_VOLUME};
use tracing_subscriber::EnvFilter;

mod commands;

pub use commands::run;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fedbatch",
    version,
    about = "Simulate, fit and optimize fed-batch squalene production in E. coli"
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). Overrides RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a forward simulation and export the trajectory.
    Simulate(SimulateArgs),
    /// Fit model parameters to experimental data.
    Fit(FitArgs),
    /// Search the feeding strategy for the best final product or biomass.
    Optimize(OptimizeArgs),
}

/// Options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Parameter file (YAML, flat or with kinetic/operation sections).
    #[arg(long, value_name = "YAML")]
    pub param: PathBuf,

    /// Initial state file (YAML with X, S, P, V). Defaults to init.yml next
    /// to the parameter file.
    #[arg(long, value_name = "YAML")]
    pub init: Option<PathBuf>,

    /// Whether product formation waits for induction (induced, continuous).
    #[arg(long, default_value_t = ProductionMode::Induced)]
    pub mode: ProductionMode,

    /// Directory for result files.
    #[arg(long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// End of the simulation (h).
    #[arg(long, default_value_t = 48.0)]
    pub t_end: f64,

    /// Reporting step (h).
    #[arg(long, default_value_t = 0.5)]
    pub step: f64,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Observed data (CSV with a time column and any of X, S, P, V).
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Free parameters (YAML, `name: [initial, lower, upper]`).
    #[arg(long, value_name = "YAML")]
    pub free: PathBuf,

    /// Maximum number of Levenberg-Marquardt iterations.
    #[arg(long, default_value_t = 100)]
    pub max_iterations: usize,

    /// Reporting step of the exported fitted trajectory (h).
    #[arg(long, default_value_t = 0.5)]
    pub step: f64,
}

#[derive(Debug, Args, Clone)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Quantity to maximize (max_product, max_biomass).
    #[arg(long)]
    pub objective: Objective,

    /// Search intervals (YAML, `name: [lower, upper]`).
    #[arg(long, value_name = "YAML")]
    pub bounds: PathBuf,

    /// Optimize the induction time.
    #[arg(long)]
    pub opt_ti: bool,

    /// Optimize the growth feed slope.
    #[arg(long)]
    pub opt_k1: bool,

    /// Optimize the production feed slope.
    #[arg(long)]
    pub opt_k2: bool,

    /// Optimize the initial feed rate.
    #[arg(long)]
    pub opt_b: bool,

    /// Optimize the feed substrate concentration.
    #[arg(long)]
    pub opt_sf: bool,

    /// Maximum working volume (L).
    #[arg(long, default_value_t = DEFAULT_MAX_VOLUME)]
    pub max_volume: f64,

    /// Optimization horizon (h).
    #[arg(long, default_value_t = DEFAULT_HORIZON)]
    pub horizon: f64,

    /// Seed for a reproducible search.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum number of generations.
    #[arg(long, default_value_t = 100)]
    pub generations: usize,
}

/// Install the global subscriber. Logs go to stderr so that stdout carries
/// only results.
pub fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
