//! Game Events
//!
//! Events generated during a tick. The sync layer turns them into
//! addressed protocol messages; tests use them to observe the simulation.

use serde::{Serialize, Deserialize};

use crate::core::grid::GridPos;
use crate::game::state::{CollectibleId, PlayerId};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player entered the world
    PlayerJoined {
        player_id: PlayerId,
        position: GridPos,
    },

    /// Player was removed from the world
    PlayerLeft {
        player_id: PlayerId,
        final_score: u64,
    },

    /// Player picked up a collectible
    CollectibleCollected {
        player_id: PlayerId,
        collectible_id: CollectibleId,
        value: u32,
        new_score: u64,
    },

    /// Collectible placed by the spawn policy
    CollectibleSpawned {
        collectible_id: CollectibleId,
        position: GridPos,
        value: u32,
    },

    /// No free cell was found for a collectible
    SpawnFailed,

    /// Player asked for a full snapshot
    ResyncRequested {
        player_id: PlayerId,
    },
}

/// A game event stamped with its tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Player involved, if any
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerJoined { player_id, .. } => Some(*player_id),
            GameEventData::PlayerLeft { player_id, .. } => Some(*player_id),
            GameEventData::CollectibleCollected { player_id, .. } => Some(*player_id),
            GameEventData::ResyncRequested { player_id } => Some(*player_id),
            GameEventData::CollectibleSpawned { .. } | GameEventData::SpawnFailed => None,
        };

        Self { tick, player_id, data }
    }

    /// Create player joined event.
    pub fn player_joined(tick: u64, player_id: PlayerId, position: GridPos) -> Self {
        Self::new(tick, GameEventData::PlayerJoined { player_id, position })
    }

    /// Create player left event.
    pub fn player_left(tick: u64, player_id: PlayerId, final_score: u64) -> Self {
        Self::new(tick, GameEventData::PlayerLeft { player_id, final_score })
    }

    /// Create collectible collected event.
    pub fn collectible_collected(
        tick: u64,
        player_id: PlayerId,
        collectible_id: CollectibleId,
        value: u32,
        new_score: u64,
    ) -> Self {
        Self::new(
            tick,
            GameEventData::CollectibleCollected {
                player_id,
                collectible_id,
                value,
                new_score,
            },
        )
    }

    /// Create collectible spawned event.
    pub fn collectible_spawned(
        tick: u64,
        collectible_id: CollectibleId,
        position: GridPos,
        value: u32,
    ) -> Self {
        Self::new(
            tick,
            GameEventData::CollectibleSpawned {
                collectible_id,
                position,
                value,
            },
        )
    }

    /// Create spawn failed event.
    pub fn spawn_failed(tick: u64) -> Self {
        Self::new(tick, GameEventData::SpawnFailed)
    }

    /// Create resync requested event.
    pub fn resync_requested(tick: u64, player_id: PlayerId) -> Self {
        Self::new(tick, GameEventData::ResyncRequested { player_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_extracted() {
        let id = PlayerId::from_u128(7);

        let event = GameEvent::collectible_collected(3, id, CollectibleId(1), 2, 2);
        assert_eq!(event.player_id, Some(id));
        assert_eq!(event.tick, 3);

        let event = GameEvent::collectible_spawned(3, CollectibleId(2), GridPos::new(0, 0), 1);
        assert_eq!(event.player_id, None);

        assert_eq!(GameEvent::resync_requested(4, id).player_id, Some(id));
    }
}
