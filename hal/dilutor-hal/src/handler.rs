//! Liquid handler trait
//!
//! Abstracts over the robot that performs the physical work. All calls are
//! blocking: the robot services one request at a time and a call returns
//! once the motion is complete.

use crate::labware::{DeckSlot, LabwareId, Mount, WellRef};

/// Trait for liquid-handling robots
///
/// Implementations own all physical state (loaded labware, tip racks,
/// which tip sits on which pipette). Errors are surfaced unmodified to the
/// caller; implementations must not retry a failed transfer on their own.
pub trait LiquidHandler {
    /// Hardware error type
    type Error: core::fmt::Debug;

    /// Load a labware definition onto a deck slot
    fn load_labware(&mut self, kind: &str, slot: DeckSlot) -> Result<LabwareId, Self::Error>;

    /// Attach a pipette to a mount, drawing tips from the given racks in order
    fn load_pipette(
        &mut self,
        kind: &str,
        mount: Mount,
        tip_racks: &[LabwareId],
    ) -> Result<(), Self::Error>;

    /// Pick up the next available tip on the given pipette
    fn pick_up_tip(&mut self, mount: Mount) -> Result<(), Self::Error>;

    /// Drop the tip currently attached to the given pipette
    fn drop_tip(&mut self, mount: Mount) -> Result<(), Self::Error>;

    /// Check if the given pipette currently carries a tip
    fn has_tip(&self, mount: Mount) -> bool;

    /// Move a volume (µL) from one well to another with the attached tip
    ///
    /// Tip handling is the caller's responsibility: a tip must already be
    /// attached, and it stays attached afterwards.
    fn transfer(
        &mut self,
        mount: Mount,
        volume_ul: f64,
        source: WellRef,
        target: WellRef,
    ) -> Result<(), Self::Error>;

    /// Switch the operator indicator (rail lights) on or off
    fn set_indicator_light(&mut self, on: bool) -> Result<(), Self::Error>;

    /// Home all axes
    fn home(&mut self) -> Result<(), Self::Error>;
}
