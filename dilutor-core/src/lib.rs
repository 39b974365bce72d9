//! Board-agnostic core logic for the preculture dilution protocol
//!
//! This crate contains all application logic that does not depend on a
//! specific robot:
//!
//! - Plate grids for measurements and volumes
//! - Dilution planner (OD grid to preculture/diluent volumes)
//! - Pipette routing table (volume to pipette lookup)
//! - Tip state machine
//! - Transfer scheduler and dispatcher
//! - Run lifecycle state machine and protocol orchestration
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod grid;
pub mod planner;
pub mod protocol;
pub mod routing;
pub mod state;
pub mod tip;

pub use dilutor_hal::{
    LabwareId, LiquidHandler, Mount, Well, WellRef, PLATE_COLUMNS, PLATE_ROWS, WELL_COUNT,
};
