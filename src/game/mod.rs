//! Game Logic Module
//!
//! All simulation code. Deterministic for a given seed and request stream.
//!
//! ## Module Structure
//!
//! - `state`: Entity store (players, collectibles, snapshot)
//! - `collision`: Exact cell-equality collision detection
//! - `spawn`: Grid-aligned placement of players and collectibles
//! - `input`: Request queue between gateway and loop
//! - `tick`: One authoritative simulation step
//! - `scheduler`: Game loop lifecycle (Idle -> Running -> Stopped)
//! - `events`: Events emitted by a tick

pub mod state;
pub mod collision;
pub mod spawn;
pub mod input;
pub mod tick;
pub mod scheduler;
pub mod events;

// Re-export key types
pub use state::{Collectible, CollectibleId, Player, PlayerId, WorldSnapshot, WorldState};
pub use input::{DrainedRequests, LifecycleRequest, RequestQueue};
pub use tick::{TickResult, WorldDelta};
pub use scheduler::{GameLoop, LoopError, LoopState};
pub use events::{GameEvent, GameEventData};
