//! Configuration types
//!
//! Board-agnostic protocol configuration. The host runner reads it from
//! TOML or from postcard binary data; everything the planner and the
//! dispatcher need is passed in explicitly through these structs.

pub mod deck;
pub mod types;

pub use deck::*;
pub use types::*;
