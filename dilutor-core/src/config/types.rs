//! Protocol configuration
//!
//! Defaults reproduce the bench protocol: dilute to OD 0.05 in 150 µL,
//! small pipette for volumes up to 30 µL, large pipette above.

use core::fmt;

use dilutor_hal::{DeckSlot, Mount};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::deck::{
    DeckConfig, LabwareConfig, PipetteConfig, MAX_DECK_SLOT, MAX_NAME_LEN, MAX_TIP_RACKS,
    MIN_DECK_SLOT,
};
use crate::dispatch::CoverageGapPolicy;
use crate::routing::{RoutingError, RoutingTable};

/// Default target OD
pub const DEFAULT_TARGET_OD: f64 = 0.05;

/// Default target volume per well (µL)
pub const DEFAULT_TARGET_VOLUME_UL: f64 = 150.0;

/// Default boundary between small and large pipette (µL)
pub const DEFAULT_PIPETTE_THRESHOLD_UL: f64 = 30.0;

/// Desired state of every target well
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DilutionTarget {
    /// Target optical density
    pub od: f64,
    /// Target volume (µL)
    pub volume_ul: f64,
}

impl Default for DilutionTarget {
    fn default() -> Self {
        Self {
            od: DEFAULT_TARGET_OD,
            volume_ul: DEFAULT_TARGET_VOLUME_UL,
        }
    }
}

impl DilutionTarget {
    /// Both values finite and positive
    pub fn is_valid(&self) -> bool {
        self.od.is_finite() && self.od > 0.0 && self.volume_ul.is_finite() && self.volume_ul > 0.0
    }
}

/// Complete protocol configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProtocolConfig {
    /// Dilution target
    pub target: DilutionTarget,
    /// Volumes at or below this go to the small pipette (µL)
    pub pipette_threshold_ul: f64,
    /// Largest volume the large pipette accepts, `None` = no limit (µL)
    pub large_volume_ceiling_ul: Option<f64>,
    /// What to do with positive volumes no pipette covers
    pub coverage_gap_policy: CoverageGapPolicy,
    /// Plate placement
    pub deck: DeckConfig,
    /// Small-volume pipette
    pub small_pipette: PipetteConfig,
    /// Large-volume pipette
    pub large_pipette: PipetteConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            target: DilutionTarget::default(),
            pipette_threshold_ul: DEFAULT_PIPETTE_THRESHOLD_UL,
            large_volume_ceiling_ul: None,
            coverage_gap_policy: CoverageGapPolicy::default(),
            deck: DeckConfig::default(),
            small_pipette: PipetteConfig::default_small(),
            large_pipette: PipetteConfig::default_large(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Target OD or volume not a finite positive number
    InvalidTarget,
    /// Pipette threshold not a finite positive number
    InvalidThreshold(f64),
    /// Large-pipette ceiling at or below the threshold
    CeilingBelowThreshold { ceiling_ul: f64, threshold_ul: f64 },
    /// Both pipettes on the same mount
    SameMount(Mount),
    /// Pipette without tip racks
    NoTipRacks(Mount),
    /// Labware or instrument name left empty
    EmptyName,
    /// Labware or instrument name longer than the name limit
    NameTooLong { len: usize },
    /// More tip racks than one pipette can hold
    TooManyTipRacks(Mount),
    /// Slot outside 1-11
    SlotOutOfRange(DeckSlot),
    /// Two pieces of labware on one slot
    SlotConflict(DeckSlot),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTarget => {
                write!(f, "target OD and volume must be positive numbers")
            }
            ConfigError::InvalidThreshold(v) => {
                write!(f, "pipette threshold {} µL must be a positive number", v)
            }
            ConfigError::CeilingBelowThreshold {
                ceiling_ul,
                threshold_ul,
            } => write!(
                f,
                "large pipette ceiling {} µL must exceed the threshold {} µL",
                ceiling_ul, threshold_ul
            ),
            ConfigError::SameMount(mount) => {
                write!(f, "both pipettes are on the {} mount", mount)
            }
            ConfigError::NoTipRacks(mount) => {
                write!(f, "{} pipette has no tip racks", mount)
            }
            ConfigError::EmptyName => write!(f, "labware or pipette name is empty"),
            ConfigError::NameTooLong { len } => write!(
                f,
                "name is {} bytes long, limit is {}",
                len, MAX_NAME_LEN
            ),
            ConfigError::TooManyTipRacks(mount) => write!(
                f,
                "{} pipette has more than {} tip racks",
                mount, MAX_TIP_RACKS
            ),
            ConfigError::SlotOutOfRange(slot) => write!(
                f,
                "deck slot {} outside {}-{}",
                slot, MIN_DECK_SLOT, MAX_DECK_SLOT
            ),
            ConfigError::SlotConflict(slot) => {
                write!(f, "deck slot {} is assigned twice", slot)
            }
        }
    }
}

impl core::error::Error for ConfigError {}

impl ProtocolConfig {
    /// Check the configuration before any hardware is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target.is_valid() {
            return Err(ConfigError::InvalidTarget);
        }

        let threshold = self.pipette_threshold_ul;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if let Some(ceiling) = self.large_volume_ceiling_ul {
            if !ceiling.is_finite() || ceiling <= threshold {
                return Err(ConfigError::CeilingBelowThreshold {
                    ceiling_ul: ceiling,
                    threshold_ul: threshold,
                });
            }
        }

        if self.small_pipette.mount == self.large_pipette.mount {
            return Err(ConfigError::SameMount(self.small_pipette.mount));
        }
        for pipette in self.pipettes() {
            if pipette.kind.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if pipette.tip_racks.is_empty() {
                return Err(ConfigError::NoTipRacks(pipette.mount));
            }
        }

        // Slots must be in range and unique across plates and tip racks
        let mut used = [false; MAX_DECK_SLOT as usize + 1];
        for labware in self.labware() {
            if labware.kind.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            let slot = labware.slot;
            if !(MIN_DECK_SLOT..=MAX_DECK_SLOT).contains(&slot) {
                return Err(ConfigError::SlotOutOfRange(slot));
            }
            if used[slot as usize] {
                return Err(ConfigError::SlotConflict(slot));
            }
            used[slot as usize] = true;
        }

        Ok(())
    }

    /// Build the volume-to-pipette routing table
    pub fn routing_table(&self) -> Result<RoutingTable, RoutingError> {
        RoutingTable::split_at(
            self.pipette_threshold_ul,
            self.small_pipette.mount,
            self.large_pipette.mount,
            self.large_volume_ceiling_ul,
        )
    }

    /// Both pipettes, small first
    pub fn pipettes(&self) -> [&PipetteConfig; 2] {
        [&self.small_pipette, &self.large_pipette]
    }

    /// Every piece of labware on the deck: plates, then tip racks
    pub fn labware(&self) -> impl Iterator<Item = &LabwareConfig> {
        self.deck.plates().into_iter().chain(
            self.pipettes()
                .into_iter()
                .flat_map(|p| p.tip_racks.iter()),
        )
    }
}
