//! Transfer scheduling
//!
//! Builds one batch per pipette, in routing priority order. A batch holds
//! every cell whose volume the pipette's route covers, in row-major order.
//! Pipettes with nothing to do get no batch, so they never pick up a tip.
//! Cells with volume ≤ 0 are skipped; positive volumes no route covers are
//! collected as unscheduled transfers instead of being dropped.

use core::fmt;

use dilutor_hal::{LabwareId, Mount, Well, WellRef, WELL_COUNT};
use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::grid::VolumeGrid;
use crate::routing::{RoutingTable, MAX_PIPETTES};

/// Tip policy for one dispatched grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TipMode {
    /// One tip per pipette batch, reused across wells (diluent)
    Never,
    /// Fresh tip for every transfer (preculture)
    Always,
}

impl TipMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            TipMode::Never => "never",
            TipMode::Always => "always",
        }
    }
}

impl fmt::Display for TipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling of positive volumes that no pipette covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CoverageGapPolicy {
    /// Fail before any hardware action
    #[default]
    Abort,
    /// Execute what can be executed, then fail
    FailAtEnd,
    /// Execute what can be executed and report the rest
    Skip,
}

/// One transfer, fully resolved
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferTask {
    /// Plate position (same on source and target)
    pub well: Well,
    pub source: WellRef,
    pub target: WellRef,
    pub volume_ul: f64,
    pub mount: Mount,
    pub tip_mode: TipMode,
}

/// A positive volume with no pipette
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnscheduledTransfer {
    pub well: Well,
    pub volume_ul: f64,
}

/// All transfers one pipette performs for a grid
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipetteBatch {
    pub mount: Mount,
    pub tasks: Vec<TransferTask, WELL_COUNT>,
}

/// Ordered transfer plan for one grid
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchSchedule {
    pub tip_mode: TipMode,
    /// Batches in routing priority order, never empty
    pub batches: Vec<PipetteBatch, MAX_PIPETTES>,
    /// Positive volumes without a pipette, row-major
    pub unscheduled: Vec<UnscheduledTransfer, WELL_COUNT>,
}

impl DispatchSchedule {
    /// Every task in execution order
    pub fn tasks(&self) -> impl Iterator<Item = &TransferTask> {
        self.batches.iter().flat_map(|b| b.tasks.iter())
    }

    pub fn transfer_count(&self) -> usize {
        self.batches.iter().map(|b| b.tasks.len()).sum()
    }

    pub fn is_fully_covered(&self) -> bool {
        self.unscheduled.is_empty()
    }
}

/// Positive volumes in a grid that no route covers, row-major
pub fn uncovered(
    volumes: &VolumeGrid,
    routing: &RoutingTable,
) -> Vec<UnscheduledTransfer, WELL_COUNT> {
    let mut out = Vec::new();
    for (well, volume_ul) in volumes.iter() {
        if routing.is_gap(volume_ul) {
            let _ = out.push(UnscheduledTransfer { well, volume_ul });
        }
    }
    out
}

/// Build the transfer plan for a grid
///
/// Each cell is moved from the same well of `source` to the same well of
/// `target`.
pub fn schedule(
    volumes: &VolumeGrid,
    source: LabwareId,
    target: LabwareId,
    routing: &RoutingTable,
    tip_mode: TipMode,
) -> DispatchSchedule {
    let mut batches = Vec::new();

    for route in routing.routes() {
        let mut tasks = Vec::new();
        for (well, volume_ul) in volumes.iter() {
            if volume_ul <= 0.0 || !route.range.contains(volume_ul) {
                continue;
            }
            let _ = tasks.push(TransferTask {
                well,
                source: WellRef::new(source, well),
                target: WellRef::new(target, well),
                volume_ul,
                mount: route.mount,
                tip_mode,
            });
        }

        if !tasks.is_empty() {
            let _ = batches.push(PipetteBatch {
                mount: route.mount,
                tasks,
            });
        }
    }

    DispatchSchedule {
        tip_mode,
        batches,
        unscheduled: uncovered(volumes, routing),
    }
}
