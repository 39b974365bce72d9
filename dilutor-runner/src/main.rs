//! Dilutor command-line entry point
//!
//! ```bash
//! # Volumes only
//! dilutor plan --readings data/plate_readings.csv
//!
//! # Full simulated run with a custom configuration
//! RUST_LOG=debug dilutor simulate -c protocol.toml -r data/plate_readings.csv --log logs/run.txt
//!
//! # Validate and export the binary form
//! dilutor check-config -c protocol.toml --export protocol.bin
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dilutor_runner::cli::{Cli, Command};
use dilutor_runner::{commands, report};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Plan(args) => {
            let plan = commands::plan(&args)?;
            print!("{}", report::format_plan(&plan));
        }
        Command::Simulate(args) => {
            let run = commands::simulate(&args)?;
            print!("{}", report::format_plan(&run.plan));
            println!();
            print!("{}", report::format_run(&run));
        }
        Command::CheckConfig(args) => {
            let config = commands::check_config(&args)?;
            println!(
                "{}: ok (target OD {}, {} µL, threshold {} µL)",
                args.config.display(),
                config.target.od,
                config.target.volume_ul,
                config.pipette_threshold_ul
            );
        }
    }

    Ok(())
}
