//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Preculture dilution planner and simulated protocol runner
#[derive(Parser, Debug)]
#[command(name = "dilutor", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the preculture and diluent volumes for a plate, no robot
    Plan(PlanArgs),
    /// Run the full protocol on the simulated robot and write the action log
    Simulate(SimulateArgs),
    /// Validate a configuration file, optionally exporting the binary form
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Protocol configuration (TOML, or postcard with a .bin extension)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Plate reader export with one OD per well
    #[arg(short, long)]
    pub readings: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    /// Where to write the action log
    #[arg(long, default_value = crate::report::DEFAULT_LOG_PATH)]
    pub log: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    /// Protocol configuration to check
    #[arg(short, long)]
    pub config: PathBuf,

    /// Write the validated configuration in binary (postcard) form
    #[arg(long)]
    pub export: Option<PathBuf>,
}
