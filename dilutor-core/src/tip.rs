//! Tip state machine
//!
//! Each mount is either idle or holding exactly one tip. `Acquire` is only
//! valid from `Idle` and `Release` only from `Holding`; anything else is an
//! invariant violation in the dispatcher.

use core::fmt;

use dilutor_hal::Mount;

/// Tip state of one pipette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TipState {
    /// No tip attached
    #[default]
    Idle,
    /// One tip attached
    Holding,
}

/// Tip transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TipEvent {
    /// Pick up a fresh tip
    Acquire,
    /// Drop the attached tip
    Release,
}

impl TipState {
    /// Process an event and return the next state
    ///
    /// Returns `None` for transitions the invariant forbids.
    pub fn transition(self, event: TipEvent) -> Option<Self> {
        match (self, event) {
            (TipState::Idle, TipEvent::Acquire) => Some(TipState::Holding),
            (TipState::Holding, TipEvent::Release) => Some(TipState::Idle),
            _ => None,
        }
    }

    pub fn is_holding(&self) -> bool {
        matches!(self, TipState::Holding)
    }
}

/// Tip invariant violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TipStateError {
    /// Acquire requested while a tip is already attached
    AlreadyHolding(Mount),
    /// Release requested with no tip attached
    NotHolding(Mount),
    /// Robot and tracker disagree about the attached tip
    Desync { mount: Mount, hardware_has_tip: bool },
}

impl fmt::Display for TipStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TipStateError::AlreadyHolding(mount) => {
                write!(f, "{} pipette already holds a tip", mount)
            }
            TipStateError::NotHolding(mount) => {
                write!(f, "{} pipette has no tip to release", mount)
            }
            TipStateError::Desync {
                mount,
                hardware_has_tip,
            } => write!(
                f,
                "{} pipette tip state out of sync (robot reports tip attached: {})",
                mount, hardware_has_tip
            ),
        }
    }
}

impl core::error::Error for TipStateError {}

/// Per-mount tip state plus usage counters
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TipTracker {
    states: [TipState; 2],
    tips_used: [u16; 2],
}

impl TipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a mount
    pub fn state(&self, mount: Mount) -> TipState {
        self.states[mount.index()]
    }

    pub fn is_holding(&self, mount: Mount) -> bool {
        self.state(mount).is_holding()
    }

    /// Check that an event is valid without applying it
    pub fn check(&self, mount: Mount, event: TipEvent) -> Result<TipState, TipStateError> {
        self.state(mount).transition(event).ok_or(match event {
            TipEvent::Acquire => TipStateError::AlreadyHolding(mount),
            TipEvent::Release => TipStateError::NotHolding(mount),
        })
    }

    /// Apply an event, counting acquired tips
    pub fn apply(&mut self, mount: Mount, event: TipEvent) -> Result<(), TipStateError> {
        let next = self.check(mount, event)?;
        self.states[mount.index()] = next;
        if event == TipEvent::Acquire {
            self.tips_used[mount.index()] = self.tips_used[mount.index()].saturating_add(1);
        }
        Ok(())
    }

    /// Tips acquired on one mount so far
    pub fn tips_used(&self, mount: Mount) -> u16 {
        self.tips_used[mount.index()]
    }

    /// Tips acquired on all mounts so far
    pub fn total_tips_used(&self) -> u16 {
        self.tips_used.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_cycle() {
        let state = TipState::Idle;
        let holding = state.transition(TipEvent::Acquire);
        assert_eq!(holding, Some(TipState::Holding));
        let idle = holding.unwrap().transition(TipEvent::Release);
        assert_eq!(idle, Some(TipState::Idle));
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(TipState::Holding.transition(TipEvent::Acquire), None);
        assert_eq!(TipState::Idle.transition(TipEvent::Release), None);
    }

    #[test]
    fn test_tracker_rejects_double_acquire() {
        let mut tracker = TipTracker::new();
        tracker.apply(Mount::Left, TipEvent::Acquire).unwrap();
        assert_eq!(
            tracker.apply(Mount::Left, TipEvent::Acquire),
            Err(TipStateError::AlreadyHolding(Mount::Left))
        );
        // The other mount is independent
        assert!(tracker.apply(Mount::Right, TipEvent::Acquire).is_ok());
        assert_eq!(tracker.total_tips_used(), 2);
    }

    #[test]
    fn test_tracker_rejects_release_when_idle() {
        let mut tracker = TipTracker::new();
        assert_eq!(
            tracker.apply(Mount::Right, TipEvent::Release),
            Err(TipStateError::NotHolding(Mount::Right))
        );
        assert_eq!(tracker.state(Mount::Right), TipState::Idle);
    }

    #[test]
    fn test_check_does_not_mutate() {
        let tracker = TipTracker::new();
        assert_eq!(
            tracker.check(Mount::Left, TipEvent::Acquire),
            Ok(TipState::Holding)
        );
        assert!(!tracker.is_holding(Mount::Left));
        assert_eq!(tracker.tips_used(Mount::Left), 0);
    }
}
