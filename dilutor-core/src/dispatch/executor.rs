//! Transfer execution
//!
//! Runs a [`DispatchSchedule`] against a [`LiquidHandler`]. Tips go through
//! the [`TipTracker`] state machine, and a held tip is released at the end of
//! every batch, including when a transfer fails part way.

use core::fmt;

use dilutor_hal::{LabwareId, LiquidHandler, Mount, WELL_COUNT};
use heapless::Vec;

use super::schedule::{
    schedule, CoverageGapPolicy, DispatchSchedule, PipetteBatch, TipMode, TransferTask,
    UnscheduledTransfer,
};
use crate::grid::VolumeGrid;
use crate::routing::RoutingTable;
use crate::tip::{TipEvent, TipStateError, TipTracker};

/// Dispatch failures
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError<E> {
    /// Positive volumes without a pipette
    CoverageGap {
        unscheduled: Vec<UnscheduledTransfer, WELL_COUNT>,
        /// Transfers already performed when the gap was reported
        executed: usize,
    },
    /// Tip invariant violated
    TipState(TipStateError),
    /// Robot error, passed through unmodified
    Hardware(E),
}

impl<E> From<TipStateError> for DispatchError<E> {
    fn from(e: TipStateError) -> Self {
        DispatchError::TipState(e)
    }
}

impl<E: fmt::Display> fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::CoverageGap {
                unscheduled,
                executed,
            } => {
                write!(
                    f,
                    "{} transfer(s) have no pipette covering their volume (after {} executed):",
                    unscheduled.len(),
                    executed
                )?;
                for u in unscheduled {
                    write!(f, " {}={} µL", u.well, u.volume_ul)?;
                }
                Ok(())
            }
            DispatchError::TipState(e) => write!(f, "tip state error: {}", e),
            DispatchError::Hardware(e) => write!(f, "hardware error: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for DispatchError<E> {}

/// What a dispatch actually did
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchReport {
    pub tip_mode: TipMode,
    /// Executed transfers in execution order
    pub executed: Vec<TransferTask, WELL_COUNT>,
    /// Transfers left out under [`CoverageGapPolicy::Skip`]
    pub skipped: Vec<UnscheduledTransfer, WELL_COUNT>,
    /// Tips picked up during this dispatch
    pub tips_used: u16,
}

impl DispatchReport {
    fn new(tip_mode: TipMode) -> Self {
        Self {
            tip_mode,
            executed: Vec::new(),
            skipped: Vec::new(),
            tips_used: 0,
        }
    }

    /// Total volume moved (µL)
    pub fn volume_ul(&self) -> f64 {
        self.executed.iter().map(|t| t.volume_ul).sum()
    }
}

/// Executes transfer schedules on a liquid handler
///
/// The dispatcher is the only owner of tip state while it lives: at most one
/// tip per mount, and no tip is left attached when a dispatch returns.
pub struct Dispatcher<'h, H: LiquidHandler> {
    handler: &'h mut H,
    tips: TipTracker,
    gap_policy: CoverageGapPolicy,
}

impl<'h, H: LiquidHandler> Dispatcher<'h, H> {
    /// Create a dispatcher for a handler whose pipettes are loaded and tip-free
    pub fn new(handler: &'h mut H, gap_policy: CoverageGapPolicy) -> Self {
        Self {
            handler,
            tips: TipTracker::new(),
            gap_policy,
        }
    }

    /// Current tip bookkeeping
    pub fn tips(&self) -> &TipTracker {
        &self.tips
    }

    /// Schedule and execute one volume grid
    pub fn dispatch(
        &mut self,
        volumes: &VolumeGrid,
        source: LabwareId,
        target: LabwareId,
        routing: &RoutingTable,
        tip_mode: TipMode,
    ) -> Result<DispatchReport, DispatchError<H::Error>> {
        let plan = schedule(volumes, source, target, routing, tip_mode);
        self.execute(&plan)
    }

    /// Execute a prepared schedule
    pub fn execute(
        &mut self,
        plan: &DispatchSchedule,
    ) -> Result<DispatchReport, DispatchError<H::Error>> {
        if !plan.is_fully_covered() && self.gap_policy == CoverageGapPolicy::Abort {
            return Err(DispatchError::CoverageGap {
                unscheduled: plan.unscheduled.clone(),
                executed: 0,
            });
        }

        let tips_before = self.tips.total_tips_used();
        let mut report = DispatchReport::new(plan.tip_mode);

        for batch in &plan.batches {
            self.run_batch(batch, plan.tip_mode, &mut report)?;
        }
        report.tips_used = self.tips.total_tips_used() - tips_before;

        if !plan.is_fully_covered() {
            match self.gap_policy {
                CoverageGapPolicy::Skip => report.skipped = plan.unscheduled.clone(),
                _ => {
                    return Err(DispatchError::CoverageGap {
                        unscheduled: plan.unscheduled.clone(),
                        executed: report.executed.len(),
                    })
                }
            }
        }

        Ok(report)
    }

    /// Run one pipette's batch, always leaving the pipette without a tip
    fn run_batch(
        &mut self,
        batch: &PipetteBatch,
        tip_mode: TipMode,
        report: &mut DispatchReport,
    ) -> Result<(), DispatchError<H::Error>> {
        let outcome = self.run_transfers(batch, tip_mode, report);

        if self.tips.is_holding(batch.mount) {
            // The first error wins; a release failure only surfaces on success
            let released = self.release(batch.mount);
            outcome.and(released)
        } else {
            outcome
        }
    }

    fn run_transfers(
        &mut self,
        batch: &PipetteBatch,
        tip_mode: TipMode,
        report: &mut DispatchReport,
    ) -> Result<(), DispatchError<H::Error>> {
        if tip_mode == TipMode::Never {
            self.acquire(batch.mount)?;
        }

        for task in &batch.tasks {
            if tip_mode == TipMode::Always {
                self.acquire(task.mount)?;
            }

            self.handler
                .transfer(task.mount, task.volume_ul, task.source, task.target)
                .map_err(DispatchError::Hardware)?;
            let _ = report.executed.push(*task);

            if tip_mode == TipMode::Always {
                self.release(task.mount)?;
            }
        }

        Ok(())
    }

    fn acquire(&mut self, mount: Mount) -> Result<(), DispatchError<H::Error>> {
        self.tips.check(mount, TipEvent::Acquire)?;
        if self.handler.has_tip(mount) {
            return Err(TipStateError::Desync {
                mount,
                hardware_has_tip: true,
            }
            .into());
        }
        self.handler
            .pick_up_tip(mount)
            .map_err(DispatchError::Hardware)?;
        self.tips.apply(mount, TipEvent::Acquire)?;
        Ok(())
    }

    fn release(&mut self, mount: Mount) -> Result<(), DispatchError<H::Error>> {
        self.tips.check(mount, TipEvent::Release)?;
        if !self.handler.has_tip(mount) {
            return Err(TipStateError::Desync {
                mount,
                hardware_has_tip: false,
            }
            .into());
        }
        self.handler.drop_tip(mount).map_err(DispatchError::Hardware)?;
        self.tips.apply(mount, TipEvent::Release)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dilutor_hal::{DeckSlot, Well, WellRef};
    use std::vec::Vec as StdVec;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Call {
        PickUp(Mount),
        Drop(Mount),
        Transfer(Mount, Well, f64),
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct MockFault;

    impl fmt::Display for MockFault {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "mock fault")
        }
    }

    // Mock robot that records every call
    #[derive(Default)]
    struct MockHandler {
        calls: StdVec<Call>,
        tips: [bool; 2],
        fail_on_transfer: Option<usize>,
        transfers: usize,
    }

    impl LiquidHandler for MockHandler {
        type Error = MockFault;

        fn load_labware(&mut self, _kind: &str, slot: DeckSlot) -> Result<LabwareId, MockFault> {
            Ok(LabwareId(slot))
        }

        fn load_pipette(
            &mut self,
            _kind: &str,
            _mount: Mount,
            _tip_racks: &[LabwareId],
        ) -> Result<(), MockFault> {
            Ok(())
        }

        fn pick_up_tip(&mut self, mount: Mount) -> Result<(), MockFault> {
            self.tips[mount.index()] = true;
            self.calls.push(Call::PickUp(mount));
            Ok(())
        }

        fn drop_tip(&mut self, mount: Mount) -> Result<(), MockFault> {
            self.tips[mount.index()] = false;
            self.calls.push(Call::Drop(mount));
            Ok(())
        }

        fn has_tip(&self, mount: Mount) -> bool {
            self.tips[mount.index()]
        }

        fn transfer(
            &mut self,
            mount: Mount,
            volume_ul: f64,
            _source: WellRef,
            target: WellRef,
        ) -> Result<(), MockFault> {
            if self.fail_on_transfer == Some(self.transfers) {
                return Err(MockFault);
            }
            self.transfers += 1;
            self.calls.push(Call::Transfer(mount, target.well, volume_ul));
            Ok(())
        }

        fn set_indicator_light(&mut self, _on: bool) -> Result<(), MockFault> {
            Ok(())
        }

        fn home(&mut self) -> Result<(), MockFault> {
            Ok(())
        }
    }

    fn well(label: &str) -> Well {
        Well::parse(label).unwrap()
    }

    fn routing() -> RoutingTable {
        RoutingTable::split_at(30.0, Mount::Left, Mount::Right, None).unwrap()
    }

    fn mixed_grid() -> VolumeGrid {
        let mut grid = VolumeGrid::filled(0.0);
        grid[well("A1")] = 135.0;
        grid[well("A2")] = 15.0;
        grid[well("B1")] = 75.0;
        grid
    }

    fn dispatch(
        handler: &mut MockHandler,
        grid: &VolumeGrid,
        routing: &RoutingTable,
        mode: TipMode,
        policy: CoverageGapPolicy,
    ) -> Result<DispatchReport, DispatchError<MockFault>> {
        let mut dispatcher = Dispatcher::new(handler, policy);
        dispatcher.dispatch(grid, LabwareId(2), LabwareId(1), routing, mode)
    }

    /// Every pick-up is followed by exactly one drop before the next pick-up
    fn assert_tip_sessions_balanced(calls: &[Call]) {
        for mount in Mount::ALL {
            let mut holding = false;
            for call in calls {
                match *call {
                    Call::PickUp(m) if m == mount => {
                        assert!(!holding, "double pick-up on {:?}", mount);
                        holding = true;
                    }
                    Call::Drop(m) if m == mount => {
                        assert!(holding, "drop without tip on {:?}", mount);
                        holding = false;
                    }
                    Call::Transfer(m, ..) if m == mount => {
                        assert!(holding, "transfer without tip on {:?}", mount);
                    }
                    _ => {}
                }
            }
            assert!(!holding, "tip leaked on {:?}", mount);
        }
    }

    #[test]
    fn test_reuse_mode_one_tip_per_pipette() {
        let mut handler = MockHandler::default();
        let report = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing(),
            TipMode::Never,
            CoverageGapPolicy::Abort,
        )
        .unwrap();

        assert_eq!(
            handler.calls,
            [
                Call::PickUp(Mount::Left),
                Call::Transfer(Mount::Left, well("A2"), 15.0),
                Call::Drop(Mount::Left),
                Call::PickUp(Mount::Right),
                Call::Transfer(Mount::Right, well("A1"), 135.0),
                Call::Transfer(Mount::Right, well("B1"), 75.0),
                Call::Drop(Mount::Right),
            ]
        );
        assert_eq!(report.tips_used, 2);
        assert_eq!(report.executed.len(), 3);
        assert_eq!(report.volume_ul(), 225.0);
    }

    #[test]
    fn test_fresh_mode_one_tip_per_transfer() {
        let mut handler = MockHandler::default();
        let report = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing(),
            TipMode::Always,
            CoverageGapPolicy::Abort,
        )
        .unwrap();

        assert_eq!(report.tips_used, 3);
        let pickups = handler
            .calls
            .iter()
            .filter(|c| matches!(c, Call::PickUp(_)))
            .count();
        assert_eq!(pickups, 3);
        assert_tip_sessions_balanced(&handler.calls);
    }

    #[test]
    fn test_empty_grid_touches_nothing() {
        let mut handler = MockHandler::default();
        let report = dispatch(
            &mut handler,
            &VolumeGrid::filled(0.0),
            &routing(),
            TipMode::Never,
            CoverageGapPolicy::Abort,
        )
        .unwrap();
        assert!(handler.calls.is_empty());
        assert_eq!(report.tips_used, 0);
    }

    #[test]
    fn test_gap_abort_before_hardware() {
        let routing =
            RoutingTable::split_at(30.0, Mount::Left, Mount::Right, Some(100.0)).unwrap();
        let mut handler = MockHandler::default();
        let result = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing,
            TipMode::Never,
            CoverageGapPolicy::Abort,
        );

        match result {
            Err(DispatchError::CoverageGap {
                unscheduled,
                executed,
            }) => {
                assert_eq!(executed, 0);
                assert_eq!(unscheduled.len(), 1);
                assert_eq!(unscheduled[0].well, well("A1"));
            }
            other => panic!("expected coverage gap, got {:?}", other),
        }
        assert!(handler.calls.is_empty());
    }

    #[test]
    fn test_gap_fail_at_end_executes_the_rest() {
        let routing =
            RoutingTable::split_at(30.0, Mount::Left, Mount::Right, Some(100.0)).unwrap();
        let mut handler = MockHandler::default();
        let result = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing,
            TipMode::Never,
            CoverageGapPolicy::FailAtEnd,
        );

        assert!(matches!(
            result,
            Err(DispatchError::CoverageGap { executed: 2, .. })
        ));
        assert_eq!(handler.transfers, 2);
        assert_tip_sessions_balanced(&handler.calls);
    }

    #[test]
    fn test_gap_skip_reports_unscheduled() {
        let routing =
            RoutingTable::split_at(30.0, Mount::Left, Mount::Right, Some(100.0)).unwrap();
        let mut handler = MockHandler::default();
        let report = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing,
            TipMode::Always,
            CoverageGapPolicy::Skip,
        )
        .unwrap();

        assert_eq!(report.executed.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].volume_ul, 135.0);
    }

    #[test]
    fn test_hardware_error_releases_tip_and_propagates() {
        let mut handler = MockHandler {
            fail_on_transfer: Some(1),
            ..MockHandler::default()
        };
        let result = dispatch(
            &mut handler,
            &VolumeGrid::filled(50.0),
            &routing(),
            TipMode::Never,
            CoverageGapPolicy::Abort,
        );

        assert_eq!(result, Err(DispatchError::Hardware(MockFault)));
        assert_eq!(handler.transfers, 1);
        assert_eq!(handler.calls.last(), Some(&Call::Drop(Mount::Right)));
        assert!(!handler.has_tip(Mount::Right));
        assert_tip_sessions_balanced(&handler.calls);
    }

    #[test]
    fn test_hardware_error_in_fresh_mode_releases_tip() {
        let mut handler = MockHandler {
            fail_on_transfer: Some(0),
            ..MockHandler::default()
        };
        let result = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing(),
            TipMode::Always,
            CoverageGapPolicy::Abort,
        );

        assert_eq!(result, Err(DispatchError::Hardware(MockFault)));
        assert_eq!(
            handler.calls,
            [Call::PickUp(Mount::Left), Call::Drop(Mount::Left)]
        );
    }

    #[test]
    fn test_desync_detected_when_robot_already_holds_tip() {
        let mut handler = MockHandler::default();
        handler.tips[Mount::Left.index()] = true;
        let result = dispatch(
            &mut handler,
            &mixed_grid(),
            &routing(),
            TipMode::Never,
            CoverageGapPolicy::Abort,
        );

        assert_eq!(
            result,
            Err(DispatchError::TipState(TipStateError::Desync {
                mount: Mount::Left,
                hardware_has_tip: true
            }))
        );
        assert!(handler.calls.is_empty());
    }

    #[test]
    fn test_tracker_idle_after_dispatch() {
        let mut handler = MockHandler::default();
        let mut dispatcher = Dispatcher::new(&mut handler, CoverageGapPolicy::Abort);
        dispatcher
            .dispatch(
                &mixed_grid(),
                LabwareId(4),
                LabwareId(1),
                &routing(),
                TipMode::Always,
            )
            .unwrap();
        assert!(!dispatcher.tips().is_holding(Mount::Left));
        assert!(!dispatcher.tips().is_holding(Mount::Right));
        assert_eq!(dispatcher.tips().total_tips_used(), 3);
    }
}
