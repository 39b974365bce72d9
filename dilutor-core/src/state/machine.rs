//! Run state definition
//!
//! Diluent is always dispensed before preculture; the transition table
//! has no path that reaches `Inoculating` without passing `Diluting`.

use super::events::Event;

/// Run states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Nothing running
    Idle,
    /// Computing volumes, validating config and coverage
    Planning,
    /// Loading labware and pipettes
    Loading,
    /// Distributing diluent with reused tips
    Diluting,
    /// Distributing preculture with fresh tips
    Inoculating,
    /// Returning the gantry home
    Homing,
    /// All transfers done
    Complete,
    /// Run aborted
    Failed(FailureKind),
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureKind {
    /// Protocol configuration rejected
    InvalidConfig,
    /// A measured OD is unusable
    InvalidMeasurement,
    /// A positive volume has no pipette
    CoverageGap,
    /// Tip invariant violated
    TipState,
    /// Robot reported an error
    Hardware,
}

impl State {
    /// Check if this is a terminal state requiring operator action
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Complete | State::Failed(_))
    }

    /// Process an event and return the next state
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use State::*;

        match (self, event) {
            (Idle, Start) => Planning,

            (Planning, PlanReady) => Loading,
            (Loading, DeckLoaded) => Diluting,
            (Diluting, DiluentDispensed) => Inoculating,
            (Inoculating, PrecultureDispensed) => Homing,
            (Homing, Homed) => Complete,

            // Any active state can fail
            (Planning | Loading | Diluting | Inoculating | Homing, Fault(kind)) => Failed(kind),

            (Complete | Failed(_), Reset) => Idle,

            // Default: stay in current state
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = State::Idle;
        for event in [
            Event::Start,
            Event::PlanReady,
            Event::DeckLoaded,
            Event::DiluentDispensed,
            Event::PrecultureDispensed,
            Event::Homed,
        ] {
            state = state.transition(event);
        }
        assert_eq!(state, State::Complete);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_preculture_cannot_skip_diluent() {
        let state = State::Loading;
        assert_eq!(state.transition(Event::PrecultureDispensed), State::Loading);
        let diluting = state.transition(Event::DeckLoaded);
        assert_eq!(
            diluting.transition(Event::PrecultureDispensed),
            State::Diluting
        );
    }

    #[test]
    fn test_fault_from_active_states() {
        let states = [
            State::Planning,
            State::Loading,
            State::Diluting,
            State::Inoculating,
            State::Homing,
        ];

        for state in states {
            let next = state.transition(Event::Fault(FailureKind::Hardware));
            assert_eq!(next, State::Failed(FailureKind::Hardware));
        }
    }

    #[test]
    fn test_fault_ignored_when_idle() {
        let next = State::Idle.transition(Event::Fault(FailureKind::TipState));
        assert_eq!(next, State::Idle);
    }

    #[test]
    fn test_reset_from_terminal() {
        assert_eq!(State::Complete.transition(Event::Reset), State::Idle);
        assert_eq!(
            State::Failed(FailureKind::CoverageGap).transition(Event::Reset),
            State::Idle
        );
        assert_eq!(State::Diluting.transition(Event::Reset), State::Diluting);
    }
}
