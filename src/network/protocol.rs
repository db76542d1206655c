//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object with a kebab-case `type` tag;
//! payload fields are camelCase.

use serde::{Serialize, Deserialize};

use crate::config::GameConfig;
use crate::game::state::{PlayerId, PlayerView, WorldSnapshot};
use crate::game::tick::WorldDelta;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Request to move one step.
    Move(MoveIntent),

    /// Ask for a full snapshot (after a gap or on reconnect).
    SyncRequest,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

/// Movement intent.
///
/// Both fields stay strings here; the gateway validates them so a bad
/// direction or foreign id gets a precise error instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIntent {
    /// Player the client claims to control.
    pub player_id: String,
    /// One of `up`, `down`, `left`, `right`.
    pub direction: String,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full state for a newly joined connection.
    JoinAck(JoinAck),

    /// Full state (periodic or on request).
    Snapshot(WorldSnapshot),

    /// Another player joined.
    PlayerJoined(PlayerView),

    /// A player left.
    PlayerLeft { id: PlayerId },

    /// Entities changed during a tick.
    StateDelta(WorldDelta),

    /// Pong response.
    #[serde(rename_all = "camelCase")]
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Join acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    /// The player this connection controls.
    pub player_id: PlayerId,
    /// World constants.
    pub world: WorldInfo,
    /// World state at the end of the join tick.
    #[serde(flatten)]
    pub snapshot: WorldSnapshot,
}

/// World constants a client needs to render and predict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    /// World width in grid units.
    pub world_width: u32,
    /// World height in grid units.
    pub world_height: u32,
    /// Cell size.
    pub grid_size: u32,
    /// Milliseconds between ticks.
    pub tick_interval_ms: u64,
    /// Distance moved per tick.
    pub player_speed_per_tick: u32,
}

impl From<&GameConfig> for WorldInfo {
    fn from(config: &GameConfig) -> Self {
        Self {
            world_width: config.world_width,
            world_height: config.world_height,
            grid_size: config.grid_size,
            tick_interval_ms: config.tick_interval_ms,
            player_speed_per_tick: config.player_speed_per_tick,
        }
    }
}

/// Error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Not valid JSON or not a known message.
    InvalidMessage,
    /// Input names a player this connection does not own.
    NotOwner,
    /// Direction is not one of the four allowed values.
    InvalidDirection,
    /// Server is full.
    ConnectionLimitReached,
    /// Internal error.
    InternalError,
}

impl ServerMessage {
    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ServerError {
            code,
            message: message.into(),
        })
    }

    /// True for messages that carry the complete world state.
    pub fn is_full_sync(&self) -> bool {
        matches!(self, Self::JoinAck(_) | Self::Snapshot(_))
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
