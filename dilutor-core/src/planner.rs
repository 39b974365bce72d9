//! Dilution planner
//!
//! Turns a grid of measured preculture ODs into the two volume grids that
//! bring every well to the target OD and volume:
//!
//! ```text
//! preculture = target_volume × target_od / od
//! diluent    = max(0, target_volume − preculture)
//! ```
//!
//! Algorithm:
//! 1. Reject a target that is not finite and positive.
//! 2. Reject the first well (row-major) whose OD is not finite and positive,
//!    or so small that its preculture volume overflows.
//! 3. Record a warning for every well measured below the target OD.
//! 4. Compute both grids.
//!
//! A well measured below the target needs more preculture than the target
//! volume; it gets that volume and no diluent. Planning touches no hardware.

use core::fmt;

use dilutor_hal::{Well, WELL_COUNT};
use heapless::Vec;

use crate::config::DilutionTarget;
use crate::grid::{MeasurementGrid, VolumeGrid};

/// Well measured below the target OD
///
/// Non-fatal: the run proceeds, the well just ends up under target.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BelowTargetWarning {
    pub well: Well,
    pub od: f64,
}

/// Planning failures
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// Target OD or volume is not a finite positive number
    InvalidTarget { od: f64, volume_ul: f64 },
    /// A measured OD is negative, zero, not a number, or too small to dilute
    InvalidMeasurement { well: Well, value: f64 },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::InvalidTarget { od, volume_ul } => write!(
                f,
                "invalid dilution target: OD {} at {} µL (both must be positive)",
                od, volume_ul
            ),
            PlanError::InvalidMeasurement { well, value } => write!(
                f,
                "invalid measurement in well {}: OD {} (must be positive)",
                well, value
            ),
        }
    }
}

impl core::error::Error for PlanError {}

/// Output of the planner
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DilutionPlan {
    /// Preculture to move into each target well (µL)
    pub preculture: VolumeGrid,
    /// Diluent to move into each target well (µL)
    pub diluent: VolumeGrid,
    /// Wells measured below the target OD, row-major
    pub warnings: Vec<BelowTargetWarning, WELL_COUNT>,
}

impl DilutionPlan {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Total preculture volume across the plate
    pub fn preculture_total_ul(&self) -> f64 {
        self.preculture.positive_total()
    }

    /// Total diluent volume across the plate
    pub fn diluent_total_ul(&self) -> f64 {
        self.diluent.positive_total()
    }
}

/// Preculture volume needed to reach the target from a measured OD
pub fn preculture_volume(target: &DilutionTarget, od: f64) -> f64 {
    target.volume_ul * target.od / od
}

/// Diluent volume that tops a preculture volume up to the target
pub fn diluent_volume(target: &DilutionTarget, preculture_ul: f64) -> f64 {
    (target.volume_ul - preculture_ul).max(0.0)
}

/// Compute the preculture and diluent volume grids
pub fn plan(
    measurements: &MeasurementGrid,
    target: &DilutionTarget,
) -> Result<DilutionPlan, PlanError> {
    if !target.is_valid() {
        return Err(PlanError::InvalidTarget {
            od: target.od,
            volume_ul: target.volume_ul,
        });
    }

    let mut warnings = Vec::new();
    for (well, od) in measurements.iter() {
        if !od.is_finite() || od <= 0.0 || !preculture_volume(target, od).is_finite() {
            return Err(PlanError::InvalidMeasurement { well, value: od });
        }
        if od < target.od {
            // Capacity equals the well count, so this cannot overflow
            let _ = warnings.push(BelowTargetWarning { well, od });
        }
    }

    let preculture = measurements.map(|od| preculture_volume(target, od));
    let diluent = preculture.map(|v| diluent_volume(target, v));

    Ok(DilutionPlan {
        preculture,
        diluent,
        warnings,
    })
}
