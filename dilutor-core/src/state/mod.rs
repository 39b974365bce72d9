//! Run lifecycle state machine
//!
//! Tracks where a protocol run is. The state machine is explicit, finite,
//! and deterministic.

pub mod events;
pub mod machine;

pub use events::Event;
pub use machine::{FailureKind, State};
