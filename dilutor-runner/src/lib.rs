//! Host runner for Dilutor
//!
//! Loads protocol configuration and plate reader exports from disk, prints
//! dilution plans and drives the simulated robot through a full run.

pub mod cli;
pub mod commands;
pub mod config;
pub mod readings;
pub mod report;
