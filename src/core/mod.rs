//! Core deterministic primitives.
//!
//! Grid geometry, the seeded RNG and state hashing. Nothing here touches
//! the clock, the network or floating point.

pub mod grid;
pub mod rng;
pub mod hash;

// Re-export core types
pub use grid::{Direction, GridPos, InvalidDirection, WorldBounds};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash};
