//! Subcommand implementations
//!
//! Each command returns its result instead of printing, so `main` owns the
//! output and tests can inspect what happened.

use anyhow::{Context, Result};
use dilutor_core::config::ProtocolConfig;
use dilutor_core::grid::MeasurementGrid;
use dilutor_core::planner::{self, DilutionPlan};
use dilutor_core::protocol::{ProtocolRunner, RunReport};
use dilutor_drivers::SimulatedRobot;
use tracing::{info, warn};

use crate::cli::{CheckConfigArgs, PlanArgs, SimulateArgs};
use crate::{config, readings, report};

/// Config and readings for one plate
struct Inputs {
    config: ProtocolConfig,
    measurements: MeasurementGrid,
}

fn load_inputs(args: &PlanArgs) -> Result<Inputs> {
    let config = config::load(args.config.as_deref()).context("failed to load configuration")?;
    let measurements = readings::load(&args.readings).context("failed to load plate readings")?;
    Ok(Inputs {
        config,
        measurements,
    })
}

fn log_warnings(plan: &DilutionPlan) {
    for warning in &plan.warnings {
        warn!(
            well = %warning.well,
            od = warning.od,
            "Preculture OD below target, well will be under-diluted"
        );
    }
}

/// Compute the volume grids without touching a robot
pub fn plan(args: &PlanArgs) -> Result<DilutionPlan> {
    let inputs = load_inputs(args)?;
    let plan = planner::plan(&inputs.measurements, &inputs.config.target)?;
    log_warnings(&plan);
    info!(
        preculture_ul = plan.preculture_total_ul(),
        diluent_ul = plan.diluent_total_ul(),
        "Plan computed"
    );
    Ok(plan)
}

/// Run the protocol on the simulated robot
///
/// The action log is written whether or not the run succeeds.
pub fn simulate(args: &SimulateArgs) -> Result<RunReport> {
    let inputs = load_inputs(&args.plan)?;
    let mut robot = SimulatedRobot::new();

    info!("Starting simulated run");
    let mut runner = ProtocolRunner::new(&mut robot, &inputs.config);
    let result = runner.run(&inputs.measurements);
    let state = runner.state();

    report::write_log(&args.log, robot.actions())?;
    info!(
        actions = robot.actions().len(),
        "Action log written to {}",
        args.log.display()
    );

    let run = result.with_context(|| format!("protocol run failed in state {:?}", state))?;
    log_warnings(&run.plan);
    for skipped in run.diluent.skipped.iter().chain(&run.preculture.skipped) {
        warn!(
            well = %skipped.well,
            volume_ul = skipped.volume_ul,
            "Transfer skipped, no pipette covers this volume"
        );
    }
    for note in robot.notes() {
        warn!("{}", note);
    }
    info!(
        transfers = run.transfer_count(),
        tips = run.tips_used(),
        "Simulated run complete"
    );
    Ok(run)
}

/// Validate a configuration file and optionally export it
pub fn check_config(args: &CheckConfigArgs) -> Result<ProtocolConfig> {
    let config = config::load(Some(&args.config))
        .with_context(|| format!("{} is not a valid configuration", args.config.display()))?;
    config
        .routing_table()
        .context("pipette routing is inconsistent")?;

    if let Some(path) = &args.export {
        config::export(&config, path).context("failed to export configuration")?;
    }
    Ok(config)
}
