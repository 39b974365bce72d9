//! Liquid-handler implementations
//!
//! This crate provides concrete implementations of the
//! [`LiquidHandler`](dilutor_hal::LiquidHandler) trait:
//!
//! - Labware and pipette catalog (well capacities, tip volumes, volume ranges)
//! - Simulated robot that validates every action and records an action log

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod catalog;
pub mod sim;

pub use catalog::{LabwareKind, LabwareModel, PipetteModel};
pub use sim::{Action, SimError, SimulatedRobot};
