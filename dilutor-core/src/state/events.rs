//! Events that trigger run state transitions

use super::machine::FailureKind;

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Operator started a run
    Start,
    /// Volume grids computed and checked
    PlanReady,
    /// Labware and pipettes loaded
    DeckLoaded,
    /// Diluent pass finished
    DiluentDispensed,
    /// Preculture pass finished
    PrecultureDispensed,
    /// Axes homed
    Homed,
    /// Unrecoverable error
    Fault(FailureKind),
    /// Operator acknowledged the outcome
    Reset,
}
