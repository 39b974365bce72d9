//! Simulated liquid handler
//!
//! Runs a protocol without a robot. Every call is checked against the
//! catalog and the current deck state, then appended to an action log.
//! The `Display` form of each [`Action`] is one line of the run log.
//!
//! Physical behaviour that is modelled:
//!
//! - Tips are taken column by column (A1, B1, ..., H1, A2, ...) from the
//!   pipette's racks in load order
//! - Transfers larger than the pipette maximum are split into equal cycles
//! - Volume dispensed into every plate well is tracked against its capacity
//!
//! Source wells are treated as inexhaustible.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use dilutor_core::config::{MAX_DECK_SLOT, MAX_TIP_RACKS, MIN_DECK_SLOT};
use dilutor_hal::{DeckSlot, LabwareId, LiquidHandler, Mount, Well, WellRef, PLATE_ROWS, WELL_COUNT};

use crate::catalog::{LabwareKind, LabwareModel, PipetteModel};

/// Tolerance for volume comparisons (µL)
const VOLUME_EPSILON_UL: f64 = 1e-6;

/// Simulator errors
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Labware name not in the catalog
    UnknownLabware(String),
    /// Pipette name not in the catalog
    UnknownPipette(String),
    /// Slot outside the deck
    SlotOutOfRange(DeckSlot),
    /// Slot already holds labware
    SlotOccupied(DeckSlot),
    /// Mount already holds a pipette
    MountOccupied(Mount),
    /// No pipette loaded on the mount
    NoPipette(Mount),
    /// Id was never handed out by `load_labware`
    UnknownLabwareId(LabwareId),
    /// Liquid handled on something that is not a plate
    NotAPlate(LabwareId),
    /// Tips requested from something that is not a tip rack
    NotATipRack(LabwareId),
    /// Rack tips smaller than the pipette's maximum volume
    IncompatibleTips { mount: Mount, rack: LabwareId },
    /// Pipette loaded without racks
    NoTipRacks(Mount),
    /// More racks than a pipette can be assigned
    TooManyTipRacks(Mount),
    /// Every rack of the pipette is empty
    OutOfTips(Mount),
    /// Pick-up while a tip is attached
    TipAlreadyAttached(Mount),
    /// Drop or transfer without a tip
    NoTipAttached(Mount),
    /// Volume not a finite positive number
    InvalidVolume(f64),
    /// Dispense would exceed the well capacity
    WellOverflow {
        well: WellRef,
        volume_ul: f64,
        capacity_ul: f64,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownLabware(name) => write!(f, "unknown labware '{}'", name),
            SimError::UnknownPipette(name) => write!(f, "unknown pipette '{}'", name),
            SimError::SlotOutOfRange(slot) => write!(
                f,
                "deck slot {} outside {}-{}",
                slot, MIN_DECK_SLOT, MAX_DECK_SLOT
            ),
            SimError::SlotOccupied(slot) => write!(f, "deck slot {} is already occupied", slot),
            SimError::MountOccupied(mount) => {
                write!(f, "{} mount already has a pipette", mount)
            }
            SimError::NoPipette(mount) => write!(f, "no pipette on the {} mount", mount),
            SimError::UnknownLabwareId(id) => write!(f, "{} was never loaded", id),
            SimError::NotAPlate(id) => write!(f, "{} is not a plate", id),
            SimError::NotATipRack(id) => write!(f, "{} is not a tip rack", id),
            SimError::IncompatibleTips { mount, rack } => {
                write!(f, "tips in {} are too small for the {} pipette", rack, mount)
            }
            SimError::NoTipRacks(mount) => write!(f, "{} pipette has no tip racks", mount),
            SimError::TooManyTipRacks(mount) => write!(
                f,
                "{} pipette has more than {} tip racks",
                mount, MAX_TIP_RACKS
            ),
            SimError::OutOfTips(mount) => write!(f, "{} pipette ran out of tips", mount),
            SimError::TipAlreadyAttached(mount) => {
                write!(f, "{} pipette already has a tip attached", mount)
            }
            SimError::NoTipAttached(mount) => write!(f, "{} pipette has no tip attached", mount),
            SimError::InvalidVolume(v) => write!(f, "invalid transfer volume {} µL", v),
            SimError::WellOverflow {
                well,
                volume_ul,
                capacity_ul,
            } => write!(
                f,
                "{} would hold {:.2} µL, capacity is {:.2} µL",
                well, volume_ul, capacity_ul
            ),
        }
    }
}

impl core::error::Error for SimError {}

/// One recorded robot action
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    LoadLabware {
        id: LabwareId,
        name: &'static str,
        slot: DeckSlot,
    },
    LoadPipette {
        mount: Mount,
        name: &'static str,
    },
    PickUpTip {
        mount: Mount,
        tip: WellRef,
    },
    DropTip {
        mount: Mount,
    },
    Aspirate {
        mount: Mount,
        volume_ul: f64,
        source: WellRef,
    },
    Dispense {
        mount: Mount,
        volume_ul: f64,
        target: WellRef,
    },
    /// Transfer below the pipette's accurate range; executed anyway
    BelowMinimumVolume {
        mount: Mount,
        volume_ul: f64,
        min_volume_ul: f64,
    },
    IndicatorLight(bool),
    Home,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::LoadLabware { id, name, slot } => {
                write!(f, "Loading {} as {} in slot {}", name, id, slot)
            }
            Action::LoadPipette { mount, name } => {
                write!(f, "Loading {} on the {} mount", name, mount)
            }
            Action::PickUpTip { mount, tip } => {
                write!(f, "Picking up tip from {} ({})", tip, mount)
            }
            Action::DropTip { mount } => write!(f, "Dropping tip into trash ({})", mount),
            Action::Aspirate {
                mount,
                volume_ul,
                source,
            } => write!(f, "Aspirating {:.2} uL from {} ({})", volume_ul, source, mount),
            Action::Dispense {
                mount,
                volume_ul,
                target,
            } => write!(f, "Dispensing {:.2} uL into {} ({})", volume_ul, target, mount),
            Action::BelowMinimumVolume {
                mount,
                volume_ul,
                min_volume_ul,
            } => write!(
                f,
                "Note: {:.2} uL is below the {:.2} uL minimum of the {} pipette",
                volume_ul, min_volume_ul, mount
            ),
            Action::IndicatorLight(true) => write!(f, "Turning rail lights on"),
            Action::IndicatorLight(false) => write!(f, "Turning rail lights off"),
            Action::Home => write!(f, "Homing"),
        }
    }
}

#[derive(Debug, Clone)]
enum ItemState {
    Plate { dispensed: [f64; WELL_COUNT] },
    TipRack { next_tip: usize },
}

#[derive(Debug, Clone)]
struct DeckItem {
    model: LabwareModel,
    slot: DeckSlot,
    state: ItemState,
}

#[derive(Debug, Clone)]
struct Instrument {
    model: PipetteModel,
    tip_racks: heapless::Vec<LabwareId, MAX_TIP_RACKS>,
    tip_attached: bool,
    tips_used: u16,
}

/// In-memory liquid handler
#[derive(Debug, Clone, Default)]
pub struct SimulatedRobot {
    deck: Vec<DeckItem>,
    instruments: [Option<Instrument>; 2],
    light_on: bool,
    actions: Vec<Action>,
}

impl SimulatedRobot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered action log
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Below-minimum transfers that were executed anyway
    pub fn notes(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::BelowMinimumVolume { .. }))
    }

    /// Total volume dispensed into a plate well (µL)
    pub fn dispensed(&self, well: WellRef) -> Option<f64> {
        match &self.deck.get(well.labware.0 as usize)?.state {
            ItemState::Plate { dispensed } => Some(dispensed[well.well.index()]),
            ItemState::TipRack { .. } => None,
        }
    }

    /// Tips picked up by the pipette on a mount
    pub fn tips_used(&self, mount: Mount) -> u16 {
        self.instruments[mount.index()]
            .as_ref()
            .map_or(0, |i| i.tips_used)
    }

    /// Catalog name and slot of loaded labware
    pub fn labware(&self, id: LabwareId) -> Option<(&'static str, DeckSlot)> {
        self.deck
            .get(id.0 as usize)
            .map(|item| (item.model.name, item.slot))
    }

    pub fn light_on(&self) -> bool {
        self.light_on
    }

    fn record(&mut self, action: Action) {
        self.actions.push(action);
    }

    fn item(&self, id: LabwareId) -> Result<&DeckItem, SimError> {
        self.deck
            .get(id.0 as usize)
            .ok_or(SimError::UnknownLabwareId(id))
    }

    fn instrument(&self, mount: Mount) -> Result<&Instrument, SimError> {
        self.instruments[mount.index()]
            .as_ref()
            .ok_or(SimError::NoPipette(mount))
    }

    fn instrument_mut(&mut self, mount: Mount) -> Result<&mut Instrument, SimError> {
        self.instruments[mount.index()]
            .as_mut()
            .ok_or(SimError::NoPipette(mount))
    }

    fn well_capacity(&self, id: LabwareId) -> Result<f64, SimError> {
        match self.item(id)?.model.kind {
            LabwareKind::Plate { well_capacity_ul } => Ok(well_capacity_ul),
            LabwareKind::TipRack { .. } => Err(SimError::NotAPlate(id)),
        }
    }

    fn dispensed_mut(&mut self, well: WellRef) -> Result<&mut f64, SimError> {
        let item = self
            .deck
            .get_mut(well.labware.0 as usize)
            .ok_or(SimError::UnknownLabwareId(well.labware))?;
        match &mut item.state {
            ItemState::Plate { dispensed } => Ok(&mut dispensed[well.well.index()]),
            ItemState::TipRack { .. } => Err(SimError::NotAPlate(well.labware)),
        }
    }

    /// Take the next tip from the first non-empty rack
    fn next_tip(&mut self, racks: &[LabwareId]) -> Option<WellRef> {
        for &rack in racks {
            let Some(DeckItem {
                state: ItemState::TipRack { next_tip },
                ..
            }) = self.deck.get_mut(rack.0 as usize)
            else {
                continue;
            };
            if *next_tip >= WELL_COUNT {
                continue;
            }
            // Column-major: A1, B1, ..., H1, A2, ...
            let well = Well::new(*next_tip % PLATE_ROWS, *next_tip / PLATE_ROWS)?;
            *next_tip += 1;
            return Some(WellRef::new(rack, well));
        }
        None
    }
}

impl LiquidHandler for SimulatedRobot {
    type Error = SimError;

    fn load_labware(&mut self, kind: &str, slot: DeckSlot) -> Result<LabwareId, SimError> {
        let model =
            LabwareModel::lookup(kind).ok_or_else(|| SimError::UnknownLabware(String::from(kind)))?;
        if !(MIN_DECK_SLOT..=MAX_DECK_SLOT).contains(&slot) {
            return Err(SimError::SlotOutOfRange(slot));
        }
        if self.deck.iter().any(|item| item.slot == slot) {
            return Err(SimError::SlotOccupied(slot));
        }

        let id = LabwareId(self.deck.len() as u8);
        let state = match model.kind {
            LabwareKind::Plate { .. } => ItemState::Plate {
                dispensed: [0.0; WELL_COUNT],
            },
            LabwareKind::TipRack { .. } => ItemState::TipRack { next_tip: 0 },
        };
        self.deck.push(DeckItem { model, slot, state });
        self.record(Action::LoadLabware {
            id,
            name: model.name,
            slot,
        });
        Ok(id)
    }

    fn load_pipette(
        &mut self,
        kind: &str,
        mount: Mount,
        tip_racks: &[LabwareId],
    ) -> Result<(), SimError> {
        let model =
            PipetteModel::lookup(kind).ok_or_else(|| SimError::UnknownPipette(String::from(kind)))?;
        if self.instruments[mount.index()].is_some() {
            return Err(SimError::MountOccupied(mount));
        }
        if tip_racks.is_empty() {
            return Err(SimError::NoTipRacks(mount));
        }

        let mut racks = heapless::Vec::new();
        for &rack in tip_racks {
            match self.item(rack)?.model.kind {
                LabwareKind::TipRack { tip_volume_ul }
                    if tip_volume_ul + VOLUME_EPSILON_UL >= model.max_volume_ul => {}
                LabwareKind::TipRack { .. } => {
                    return Err(SimError::IncompatibleTips { mount, rack })
                }
                LabwareKind::Plate { .. } => return Err(SimError::NotATipRack(rack)),
            }
            racks
                .push(rack)
                .map_err(|_| SimError::TooManyTipRacks(mount))?;
        }

        self.instruments[mount.index()] = Some(Instrument {
            model,
            tip_racks: racks,
            tip_attached: false,
            tips_used: 0,
        });
        self.record(Action::LoadPipette {
            mount,
            name: model.name,
        });
        Ok(())
    }

    fn pick_up_tip(&mut self, mount: Mount) -> Result<(), SimError> {
        let instrument = self.instrument(mount)?;
        if instrument.tip_attached {
            return Err(SimError::TipAlreadyAttached(mount));
        }
        let racks = instrument.tip_racks.clone();

        let tip = self.next_tip(&racks).ok_or(SimError::OutOfTips(mount))?;
        let instrument = self.instrument_mut(mount)?;
        instrument.tip_attached = true;
        instrument.tips_used += 1;
        self.record(Action::PickUpTip { mount, tip });
        Ok(())
    }

    fn drop_tip(&mut self, mount: Mount) -> Result<(), SimError> {
        let instrument = self.instrument_mut(mount)?;
        if !instrument.tip_attached {
            return Err(SimError::NoTipAttached(mount));
        }
        instrument.tip_attached = false;
        self.record(Action::DropTip { mount });
        Ok(())
    }

    fn has_tip(&self, mount: Mount) -> bool {
        self.instruments[mount.index()]
            .as_ref()
            .is_some_and(|i| i.tip_attached)
    }

    fn transfer(
        &mut self,
        mount: Mount,
        volume_ul: f64,
        source: WellRef,
        target: WellRef,
    ) -> Result<(), SimError> {
        let instrument = self.instrument(mount)?;
        if !instrument.tip_attached {
            return Err(SimError::NoTipAttached(mount));
        }
        let model = instrument.model;
        if !volume_ul.is_finite() || volume_ul <= 0.0 {
            return Err(SimError::InvalidVolume(volume_ul));
        }

        self.well_capacity(source.labware)?;
        let capacity_ul = self.well_capacity(target.labware)?;
        let filled = self.dispensed(target).unwrap_or(0.0) + volume_ul;
        if filled > capacity_ul + VOLUME_EPSILON_UL {
            return Err(SimError::WellOverflow {
                well: target,
                volume_ul: filled,
                capacity_ul,
            });
        }

        if volume_ul + VOLUME_EPSILON_UL < model.min_volume_ul {
            self.record(Action::BelowMinimumVolume {
                mount,
                volume_ul,
                min_volume_ul: model.min_volume_ul,
            });
        }

        let cycles = model.cycles_for(volume_ul);
        let per_cycle = volume_ul / cycles as f64;
        for _ in 0..cycles {
            self.record(Action::Aspirate {
                mount,
                volume_ul: per_cycle,
                source,
            });
            self.record(Action::Dispense {
                mount,
                volume_ul: per_cycle,
                target,
            });
        }

        *self.dispensed_mut(target)? = filled;
        Ok(())
    }

    fn set_indicator_light(&mut self, on: bool) -> Result<(), SimError> {
        self.light_on = on;
        self.record(Action::IndicatorLight(on));
        Ok(())
    }

    fn home(&mut self) -> Result<(), SimError> {
        self.record(Action::Home);
        Ok(())
    }
}
