//! Protocol orchestration
//!
//! One run of the dilution protocol:
//!
//! 1. Validate config, build routing, plan volumes (no hardware yet).
//! 2. Under [`CoverageGapPolicy::Abort`], reject coverage gaps in either grid.
//! 3. Indicator light on, load plates, tip racks and pipettes.
//! 4. Dispatch the diluent grid from the media plate, reusing tips.
//! 5. Dispatch the preculture grid from the preculture plate, fresh tips.
//! 6. Home, indicator light off.
//!
//! Any failure after the light went on switches it off again (best effort)
//! and returns the original error.

use core::fmt;

use dilutor_hal::{LabwareId, LiquidHandler};
use heapless::Vec;

use crate::config::{ConfigError, LabwareConfig, PipetteConfig, ProtocolConfig, MAX_TIP_RACKS};
use crate::dispatch::{
    uncovered, CoverageGapPolicy, DispatchError, DispatchReport, Dispatcher, TipMode,
};
use crate::grid::MeasurementGrid;
use crate::planner::{plan, DilutionPlan, PlanError};
use crate::routing::RoutingError;
use crate::state::{Event, FailureKind, State};

/// Run failures
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunError<E> {
    /// Configuration rejected
    Config(ConfigError),
    /// Pipette routing rejected
    Routing(RoutingError),
    /// Measurements rejected
    Plan(PlanError),
    /// Transfer dispatch failed
    Dispatch(DispatchError<E>),
    /// Robot error outside dispatch (loading, lights, homing)
    Hardware(E),
}

impl<E> RunError<E> {
    /// Failure category for the run state machine
    pub fn kind(&self) -> FailureKind {
        match self {
            RunError::Config(_) | RunError::Routing(_) => FailureKind::InvalidConfig,
            RunError::Plan(_) => FailureKind::InvalidMeasurement,
            RunError::Dispatch(DispatchError::CoverageGap { .. }) => FailureKind::CoverageGap,
            RunError::Dispatch(DispatchError::TipState(_)) => FailureKind::TipState,
            RunError::Dispatch(DispatchError::Hardware(_)) | RunError::Hardware(_) => {
                FailureKind::Hardware
            }
        }
    }
}

impl<E> From<ConfigError> for RunError<E> {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl<E> From<RoutingError> for RunError<E> {
    fn from(e: RoutingError) -> Self {
        RunError::Routing(e)
    }
}

impl<E> From<PlanError> for RunError<E> {
    fn from(e: PlanError) -> Self {
        RunError::Plan(e)
    }
}

impl<E> From<DispatchError<E>> for RunError<E> {
    fn from(e: DispatchError<E>) -> Self {
        RunError::Dispatch(e)
    }
}

impl<E: fmt::Display> fmt::Display for RunError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "configuration error: {}", e),
            RunError::Routing(e) => write!(f, "pipette routing error: {}", e),
            RunError::Plan(e) => write!(f, "{}", e),
            RunError::Dispatch(e) => write!(f, "{}", e),
            RunError::Hardware(e) => write!(f, "hardware error: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for RunError<E> {}

/// Labware handles for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadedDeck {
    pub preculture: LabwareId,
    pub target: LabwareId,
    pub media: LabwareId,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunReport {
    pub plan: DilutionPlan,
    pub deck: LoadedDeck,
    pub diluent: DispatchReport,
    pub preculture: DispatchReport,
}

impl RunReport {
    pub fn tips_used(&self) -> u16 {
        self.diluent.tips_used + self.preculture.tips_used
    }

    pub fn transfer_count(&self) -> usize {
        self.diluent.executed.len() + self.preculture.executed.len()
    }
}

/// Runs the protocol on a liquid handler and tracks the run state
pub struct ProtocolRunner<'a, H: LiquidHandler> {
    handler: &'a mut H,
    config: &'a ProtocolConfig,
    state: State,
    light_on: bool,
}

impl<'a, H: LiquidHandler> ProtocolRunner<'a, H> {
    pub fn new(handler: &'a mut H, config: &'a ProtocolConfig) -> Self {
        Self {
            handler,
            config,
            state: State::Idle,
            light_on: false,
        }
    }

    /// Current run state
    pub fn state(&self) -> State {
        self.state
    }

    /// Run the full protocol for one plate of measurements
    pub fn run(&mut self, measurements: &MeasurementGrid) -> Result<RunReport, RunError<H::Error>> {
        if self.state.is_terminal() {
            self.state = self.state.transition(Event::Reset);
        }
        self.state = self.state.transition(Event::Start);

        let result = self.execute(measurements);
        if let Err(e) = &result {
            self.state = self.state.transition(Event::Fault(e.kind()));
            if self.light_on {
                let _ = self.handler.set_indicator_light(false);
                self.light_on = false;
            }
        }
        result
    }

    fn execute(&mut self, measurements: &MeasurementGrid) -> Result<RunReport, RunError<H::Error>> {
        let config = self.config;

        config.validate()?;
        let routing = config.routing_table()?;
        let plan = plan(measurements, &config.target)?;

        if config.coverage_gap_policy == CoverageGapPolicy::Abort {
            for grid in [&plan.diluent, &plan.preculture] {
                let gaps = uncovered(grid, &routing);
                if !gaps.is_empty() {
                    return Err(DispatchError::CoverageGap {
                        unscheduled: gaps,
                        executed: 0,
                    }
                    .into());
                }
            }
        }
        self.state = self.state.transition(Event::PlanReady);

        self.handler
            .set_indicator_light(true)
            .map_err(RunError::Hardware)?;
        self.light_on = true;

        let deck = self.load_deck()?;
        self.state = self.state.transition(Event::DeckLoaded);

        let mut dispatcher = Dispatcher::new(&mut *self.handler, config.coverage_gap_policy);
        let diluent = dispatcher.dispatch(
            &plan.diluent,
            deck.media,
            deck.target,
            &routing,
            TipMode::Never,
        )?;
        self.state = self.state.transition(Event::DiluentDispensed);

        let preculture = dispatcher.dispatch(
            &plan.preculture,
            deck.preculture,
            deck.target,
            &routing,
            TipMode::Always,
        )?;
        self.state = self.state.transition(Event::PrecultureDispensed);

        self.handler.home().map_err(RunError::Hardware)?;
        self.state = self.state.transition(Event::Homed);

        self.handler
            .set_indicator_light(false)
            .map_err(RunError::Hardware)?;
        self.light_on = false;

        Ok(RunReport {
            plan,
            deck,
            diluent,
            preculture,
        })
    }

    fn load_deck(&mut self) -> Result<LoadedDeck, RunError<H::Error>> {
        let config = self.config;
        let deck = &config.deck;
        let loaded = LoadedDeck {
            preculture: self.load_labware(&deck.preculture_plate)?,
            target: self.load_labware(&deck.target_plate)?,
            media: self.load_labware(&deck.media_plate)?,
        };

        for pipette in config.pipettes() {
            self.load_pipette(pipette)?;
        }

        Ok(loaded)
    }

    fn load_labware(&mut self, labware: &LabwareConfig) -> Result<LabwareId, RunError<H::Error>> {
        self.handler
            .load_labware(&labware.kind, labware.slot)
            .map_err(RunError::Hardware)
    }

    fn load_pipette(&mut self, pipette: &PipetteConfig) -> Result<(), RunError<H::Error>> {
        let mut racks: Vec<LabwareId, MAX_TIP_RACKS> = Vec::new();
        for rack in &pipette.tip_racks {
            let id = self.load_labware(rack)?;
            let _ = racks.push(id);
        }
        self.handler
            .load_pipette(&pipette.kind, pipette.mount, &racks)
            .map_err(RunError::Hardware)
    }
}

/// Run the protocol once on a handler
pub fn run<H: LiquidHandler>(
    handler: &mut H,
    config: &ProtocolConfig,
    measurements: &MeasurementGrid,
) -> Result<RunReport, RunError<H::Error>> {
    ProtocolRunner::new(handler, config).run(measurements)
}
