//! Transfer dispatch
//!
//! Turns a volume grid into per-pipette batches of transfers (pure) and
//! executes those batches against a liquid handler with the tip-reuse
//! rules of the chosen [`TipMode`].

pub mod executor;
pub mod schedule;

pub use executor::{DispatchError, DispatchReport, Dispatcher};
pub use schedule::{
    schedule, uncovered, CoverageGapPolicy, DispatchSchedule, PipetteBatch, TipMode,
    TransferTask, UnscheduledTransfer,
};
