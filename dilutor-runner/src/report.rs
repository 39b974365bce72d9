//! Text output: volume tables and the run log

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dilutor_core::grid::VolumeGrid;
use dilutor_core::planner::DilutionPlan;
use dilutor_core::protocol::RunReport;
use dilutor_core::PLATE_COLUMNS;
use dilutor_drivers::Action;

/// Default location of the simulation log
pub const DEFAULT_LOG_PATH: &str = "logs/preculture_dilution_logs.txt";

/// Render a volume grid as an aligned table, one plate row per line
pub fn format_grid(title: &str, grid: &VolumeGrid) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (µL)", title);
    let _ = write!(out, "   ");
    for column in 1..=PLATE_COLUMNS {
        let _ = write!(out, "{:>8}", column);
    }
    out.push('\n');

    for (row, cells) in grid.rows().iter().enumerate() {
        let _ = write!(out, "{:<3}", (b'A' + row as u8) as char);
        for volume in cells {
            let _ = write!(out, "{:>8.2}", volume);
        }
        out.push('\n');
    }
    out
}

/// Both volume tables plus totals and warnings
pub fn format_plan(plan: &DilutionPlan) -> String {
    let mut out = format_grid("Preculture", &plan.preculture);
    out.push('\n');
    out.push_str(&format_grid("Diluent", &plan.diluent));
    let _ = writeln!(
        out,
        "\nTotal preculture {:.2} µL, total diluent {:.2} µL",
        plan.preculture_total_ul(),
        plan.diluent_total_ul()
    );
    for warning in &plan.warnings {
        let _ = writeln!(
            out,
            "Warning: {} measured OD {} is below the target",
            warning.well, warning.od
        );
    }
    out
}

/// One-paragraph summary of a finished run
pub fn format_run(report: &RunReport) -> String {
    let mut out = String::new();
    for (name, dispatch) in [("diluent", &report.diluent), ("preculture", &report.preculture)] {
        let _ = writeln!(
            out,
            "{}: {} transfer(s), {:.2} µL, {} tip(s), tips {}",
            name,
            dispatch.executed.len(),
            dispatch.volume_ul(),
            dispatch.tips_used,
            dispatch.tip_mode
        );
        for skipped in &dispatch.skipped {
            let _ = writeln!(
                out,
                "  skipped {} ({:.2} µL): no pipette covers this volume",
                skipped.well, skipped.volume_ul
            );
        }
    }
    let _ = writeln!(
        out,
        "total: {} transfer(s), {} tip(s)",
        report.transfer_count(),
        report.tips_used()
    );
    out
}

/// Write the action log, one line per action, creating parent directories
pub fn write_log(path: &Path, actions: &[Action]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut text = String::new();
    for action in actions {
        let _ = writeln!(text, "{}", action);
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dilutor_core::{LabwareId, Mount, Well, WellRef};

    #[test]
    fn test_format_grid_layout() {
        let mut grid = VolumeGrid::filled(0.0);
        grid[Well::parse("B3").unwrap()] = 12.5;
        let text = format_grid("Preculture", &grid);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "Preculture (µL)");
        assert!(lines[1].trim_start().starts_with('1'));
        assert!(lines[1].ends_with("12"));
        assert!(lines[3].starts_with("B  "));
        assert_eq!(lines[3].split_whitespace().nth(3), Some("12.50"));
    }

    #[test]
    fn test_write_log_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.txt");
        let actions = [
            Action::IndicatorLight(true),
            Action::PickUpTip {
                mount: Mount::Right,
                tip: WellRef::new(LabwareId(4), Well::parse("A1").unwrap()),
            },
            Action::Home,
        ];
        write_log(&path, &actions).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            [
                "Turning rail lights on",
                "Picking up tip from A1 of labware#4 (right)",
                "Homing",
            ]
        );
    }
}
