//! Dilutor Hardware Abstraction Layer
//!
//! This crate defines the narrow interface between the dilution logic and
//! a liquid-handling robot. The same planning and dispatch code drives a
//! real robot, the simulator in `dilutor-drivers`, or a test mock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (dilutor-runner, etc.)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dilutor-core (planner, dispatcher)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dilutor-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   simulated   │       │  robot API    │
//! │     robot     │       │   bindings    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`handler::LiquidHandler`] - labware loading, tips, transfers, lights
//!
//! # Types
//!
//! - [`labware::Well`], [`labware::WellRef`] - plate addressing
//! - [`labware::Mount`], [`labware::LabwareId`] - hardware handles

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod handler;
pub mod labware;

// Re-export key types at crate root for convenience
pub use handler::LiquidHandler;
pub use labware::{
    DeckSlot, LabwareId, Mount, Well, WellRef, PLATE_COLUMNS, PLATE_ROWS, WELL_COUNT,
};
