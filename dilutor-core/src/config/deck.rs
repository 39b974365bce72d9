//! Deck configuration types
//!
//! These types describe what sits where on the robot deck: the three
//! plates, the tip racks and the two pipettes.

use dilutor_hal::{DeckSlot, Mount};
use heapless::{String, Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::types::ConfigError;

/// Maximum length of a labware or instrument name
pub const MAX_NAME_LEN: usize = 48;

/// Maximum tip racks per pipette
pub const MAX_TIP_RACKS: usize = 4;

/// Lowest deck slot
pub const MIN_DECK_SLOT: DeckSlot = 1;

/// Highest deck slot
pub const MAX_DECK_SLOT: DeckSlot = 11;

/// Default plate for preculture, target and media
pub const DEFAULT_PLATE: &str = "corning_96_wellplate_360ul_flat";

/// Bounded labware or instrument name
pub type Name = String<MAX_NAME_LEN>;

/// Build a [`Name`], rejecting anything longer than [`MAX_NAME_LEN`]
pub fn name(value: &str) -> Result<Name, ConfigError> {
    let mut out = Name::new();
    out.push_str(value).map_err(|_| ConfigError::NameTooLong {
        len: value.len(),
    })?;
    Ok(out)
}

/// Name for built-in defaults
///
/// Built-in names fit; should one not, it comes out empty and
/// [`validate`](super::ProtocolConfig::validate) reports it.
fn builtin(value: &str) -> Name {
    name(value).unwrap_or_default()
}

/// One piece of labware and its deck slot
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabwareConfig {
    /// Labware definition name (e.g., "corning_96_wellplate_360ul_flat")
    pub kind: Name,
    /// Deck slot (1-11)
    pub slot: DeckSlot,
}

impl LabwareConfig {
    pub fn new(kind: &str, slot: DeckSlot) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: name(kind)?,
            slot,
        })
    }

    fn builtin(kind: &str, slot: DeckSlot) -> Self {
        Self {
            kind: builtin(kind),
            slot,
        }
    }
}

/// Pipette instrument configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PipetteConfig {
    /// Instrument name (e.g., "p10_single")
    pub kind: Name,
    /// Gantry mount
    pub mount: Mount,
    /// Tip racks, used in order
    pub tip_racks: Vec<LabwareConfig, MAX_TIP_RACKS>,
}

impl PipetteConfig {
    pub fn new(
        kind: &str,
        mount: Mount,
        tip_racks: &[LabwareConfig],
    ) -> Result<Self, ConfigError> {
        let racks = Vec::from_slice(tip_racks).map_err(|_| ConfigError::TooManyTipRacks(mount))?;
        Ok(Self {
            kind: name(kind)?,
            mount,
            tip_racks: racks,
        })
    }

    /// Default small-volume pipette: p10 on the left, one 20 µL rack
    pub fn default_small() -> Self {
        let mut tip_racks = Vec::new();
        let _ = tip_racks.push(LabwareConfig::builtin("opentrons_96_tiprack_20ul", 5));
        Self {
            kind: builtin("p10_single"),
            mount: Mount::Left,
            tip_racks,
        }
    }

    /// Default large-volume pipette: p300 on the right, two 300 µL racks
    pub fn default_large() -> Self {
        let mut tip_racks = Vec::new();
        for slot in [3, 6] {
            let _ = tip_racks.push(LabwareConfig::builtin("opentrons_96_tiprack_300ul", slot));
        }
        Self {
            kind: builtin("p300_single"),
            mount: Mount::Right,
            tip_racks,
        }
    }
}

/// Plate placement
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeckConfig {
    /// Plate holding the measured precultures
    pub preculture_plate: LabwareConfig,
    /// Plate receiving the diluted cultures
    pub target_plate: LabwareConfig,
    /// Plate holding the diluent (media)
    pub media_plate: LabwareConfig,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            preculture_plate: LabwareConfig::builtin(DEFAULT_PLATE, 2),
            target_plate: LabwareConfig::builtin(DEFAULT_PLATE, 1),
            media_plate: LabwareConfig::builtin(DEFAULT_PLATE, 4),
        }
    }
}

impl DeckConfig {
    /// All plates, preculture first
    pub fn plates(&self) -> [&LabwareConfig; 3] {
        [&self.preculture_plate, &self.target_plate, &self.media_plate]
    }
}
