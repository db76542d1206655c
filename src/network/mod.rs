//! Network Layer
//!
//! WebSocket server for real-time multiplayer communication.
//! This layer never mutates the world - all requests go through the
//! request queue and are applied by the game loop.

pub mod protocol;
pub mod sync;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ErrorCode, JoinAck, MoveIntent, WorldInfo};
pub use sync::{Audience, Outbound, SyncProtocol};
pub use session::{GatewayError, SessionGateway};
pub use server::{GameServer, GameServerError};
