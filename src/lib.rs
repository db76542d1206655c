//! # Gridgrab Game Server
//!
//! Authoritative, tick-based multiplayer server: players move on an integer
//! grid and pick up collectibles for points.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     GRIDGRAB SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  config.rs       - TOML + environment configuration          │
//! │                                                              │
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Positions, directions, world bounds       │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - World state hashing                       │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── state.rs    - Entity store and snapshots                │
//! │  ├── collision.rs- Exact cell-equality collisions            │
//! │  ├── spawn.rs    - Grid-aligned spawn policy                 │
//! │  ├── input.rs    - Request queue (gateway -> loop)           │
//! │  ├── tick.rs     - Authoritative simulation step             │
//! │  └── scheduler.rs- Game loop lifecycle                       │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── sync.rs     - Tick result -> addressed messages         │
//! │  ├── session.rs  - Session gateway                           │
//! │  └── server.rs   - WebSocket server and loop driver          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! Clients only send movement intents. Connection handlers validate them
//! and push them onto a queue; the game loop is the only code that mutates
//! the world. With a fixed seed, the same queued requests always produce
//! the same world.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::{GameConfig, ServerConfig};
pub use core::grid::{Direction, GridPos, WorldBounds};
pub use core::rng::DeterministicRng;
pub use game::scheduler::{GameLoop, LoopState};
pub use game::state::{PlayerId, WorldState};
pub use network::server::GameServer;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
