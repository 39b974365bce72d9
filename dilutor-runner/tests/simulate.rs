//! End-to-end runs of the subcommands against the bundled sample data

use std::fs;
use std::path::PathBuf;

use dilutor_core::dispatch::CoverageGapPolicy;
use dilutor_core::{Mount, Well};
use dilutor_runner::cli::{CheckConfigArgs, PlanArgs, SimulateArgs};
use dilutor_runner::commands;

fn data(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

fn sample_plan_args() -> PlanArgs {
    PlanArgs {
        config: Some(data("protocol.toml")),
        readings: data("plate_readings.csv"),
    }
}

#[test]
fn plan_sample_plate() {
    let plan = commands::plan(&sample_plan_args()).unwrap();

    let a1 = Well::parse("A1").unwrap();
    assert_eq!(plan.preculture[a1], 150.0);
    assert_eq!(plan.diluent[a1], 0.0);

    // H12 is the only well below the target OD
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].well, Well::parse("H12").unwrap());
}

#[test]
fn simulate_sample_plate_writes_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs").join("run.txt");
    let args = SimulateArgs {
        plan: sample_plan_args(),
        log: log.clone(),
    };

    let run = commands::simulate(&args).unwrap();
    assert_eq!(run.preculture.executed.len(), 96);
    assert_eq!(run.diluent.executed.len(), 94);
    assert!(run
        .diluent
        .executed
        .iter()
        .all(|t| t.mount == Mount::Right));

    let text = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.first(), Some(&"Turning rail lights on"));
    assert_eq!(lines.last(), Some(&"Turning rail lights off"));
    assert_eq!(lines[lines.len() - 2], "Homing");
    let pickups = lines
        .iter()
        .filter(|l| l.starts_with("Picking up tip"))
        .count();
    assert_eq!(pickups, usize::from(run.tips_used()));
}

#[test]
fn simulate_invalid_reading_still_writes_log() {
    let dir = tempfile::tempdir().unwrap();
    let readings = dir.path().join("plate.csv");
    let text = fs::read_to_string(data("plate_readings.csv"))
        .unwrap()
        .replacen("C,0.181", "C,0", 1);
    fs::write(&readings, text).unwrap();

    let log = dir.path().join("run.txt");
    let args = SimulateArgs {
        plan: PlanArgs {
            config: None,
            readings,
        },
        log: log.clone(),
    };

    let err = commands::simulate(&args).unwrap_err();
    assert!(format!("{:#}", err).contains("C1"));
    // Rejected before the robot was touched
    assert_eq!(fs::read_to_string(&log).unwrap(), "");
}

#[test]
fn check_config_exports_binary() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("protocol.bin");

    let config = commands::check_config(&CheckConfigArgs {
        config: data("protocol.toml"),
        export: Some(bin.clone()),
    })
    .unwrap();
    assert_eq!(config.coverage_gap_policy, CoverageGapPolicy::Abort);

    let reloaded = commands::check_config(&CheckConfigArgs {
        config: bin,
        export: None,
    })
    .unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn check_config_rejects_slot_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("protocol.toml");
    let text = fs::read_to_string(data("protocol.toml"))
        .unwrap()
        .replace("slot = 4", "slot = 3");
    fs::write(&path, text).unwrap();

    let err = commands::check_config(&CheckConfigArgs {
        config: path,
        export: None,
    })
    .unwrap_err();
    assert!(format!("{:#}", err).contains("deck slot 3"));
}
