//! Sync Protocol
//!
//! Turns a [`TickResult`] into addressed messages. Routing only; delivery
//! (and backpressure) is the gateway's job.
//!
//! Per tick, in order:
//! 1. `join-ack` to each new player, `player-joined` to everyone else
//! 2. `player-left` for each removed player
//! 3. `snapshot` to each player that asked for a resync
//! 4. a periodic `snapshot`, or else a `state-delta` if anything changed

use std::collections::BTreeSet;

use crate::config::GameConfig;
use crate::game::events::GameEventData;
use crate::game::state::{PlayerId, PlayerView, WorldState};
use crate::game::tick::TickResult;
use crate::network::protocol::{JoinAck, ServerMessage, WorldInfo};

/// Who receives a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// A single player.
    One(PlayerId),
    /// Every connected player.
    All,
    /// Everyone except the listed players.
    AllExcept(BTreeSet<PlayerId>),
}

impl Audience {
    /// Whether `id` is addressed.
    pub fn includes(&self, id: &PlayerId) -> bool {
        match self {
            Self::One(target) => target == id,
            Self::All => true,
            Self::AllExcept(excluded) => !excluded.contains(id),
        }
    }
}

/// A message and its recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipients.
    pub audience: Audience,
    /// Payload.
    pub message: ServerMessage,
}

impl Outbound {
    /// Message for a single player.
    pub fn to_one(id: PlayerId, message: ServerMessage) -> Self {
        Self { audience: Audience::One(id), message }
    }

    /// Message for everyone.
    pub fn to_all(message: ServerMessage) -> Self {
        Self { audience: Audience::All, message }
    }

    /// Message for everyone except `excluded`.
    pub fn to_all_except(excluded: BTreeSet<PlayerId>, message: ServerMessage) -> Self {
        if excluded.is_empty() {
            Self::to_all(message)
        } else {
            Self { audience: Audience::AllExcept(excluded), message }
        }
    }
}

/// Builds outbound messages from tick results.
#[derive(Debug, Clone)]
pub struct SyncProtocol {
    world_info: WorldInfo,
    snapshot_interval_ticks: u64,
}

impl SyncProtocol {
    /// Create from the game settings.
    pub fn new(config: &GameConfig) -> Self {
        Self {
            world_info: WorldInfo::from(config),
            snapshot_interval_ticks: config.snapshot_interval_ticks,
        }
    }

    /// True when `tick` is due for a periodic full snapshot.
    pub fn is_snapshot_tick(&self, tick: u64) -> bool {
        self.snapshot_interval_ticks > 0 && tick % self.snapshot_interval_ticks == 0
    }

    /// Messages for one tick, in delivery order.
    pub fn messages(&self, result: &TickResult, world: &WorldState) -> Vec<Outbound> {
        let mut out = Vec::new();
        let mut full_sync: BTreeSet<PlayerId> = BTreeSet::new();
        let mut snapshot = None;

        for event in &result.events {
            match &event.data {
                GameEventData::PlayerJoined { player_id, position } => {
                    let view = world.player_view(player_id).unwrap_or(PlayerView {
                        id: *player_id,
                        x: position.x,
                        y: position.y,
                        score: 0,
                        rank: world.player_count() as u32 + 1,
                    });

                    let snapshot = snapshot.get_or_insert_with(|| world.snapshot()).clone();
                    out.push(Outbound::to_one(
                        *player_id,
                        ServerMessage::JoinAck(JoinAck {
                            player_id: *player_id,
                            world: self.world_info.clone(),
                            snapshot,
                        }),
                    ));
                    out.push(Outbound::to_all_except(
                        BTreeSet::from([*player_id]),
                        ServerMessage::PlayerJoined(view),
                    ));
                    full_sync.insert(*player_id);
                }
                GameEventData::PlayerLeft { player_id, .. } => {
                    out.push(Outbound::to_all_except(
                        BTreeSet::from([*player_id]),
                        ServerMessage::PlayerLeft { id: *player_id },
                    ));
                }
                _ => {}
            }
        }

        for event in &result.events {
            if let GameEventData::ResyncRequested { player_id } = &event.data {
                if full_sync.insert(*player_id) {
                    let snapshot = snapshot.get_or_insert_with(|| world.snapshot()).clone();
                    out.push(Outbound::to_one(*player_id, ServerMessage::Snapshot(snapshot)));
                }
            }
        }

        if self.is_snapshot_tick(result.tick) {
            let snapshot = snapshot.unwrap_or_else(|| world.snapshot());
            out.push(Outbound::to_all_except(full_sync, ServerMessage::Snapshot(snapshot)));
        } else if !result.delta.is_empty() {
            out.push(Outbound::to_all_except(
                full_sync,
                ServerMessage::StateDelta(result.delta.clone()),
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GridPos;
    use crate::game::input::RequestQueue;
    use crate::game::tick::tick;

    fn setup(snapshot_interval_ticks: u64) -> (WorldState, GameConfig, SyncProtocol) {
        let config = GameConfig {
            snapshot_interval_ticks,
            ..Default::default()
        };
        let world = WorldState::from_config(&config, 9);
        let sync = SyncProtocol::new(&config);
        (world, config, sync)
    }

    #[test]
    fn test_join_routing() {
        let (mut world, config, sync) = setup(0);
        let a = PlayerId::from_u128(1);
        let queue = RequestQueue::new();

        queue.push_join(a);
        let result = tick(&mut world, queue.drain(), &config);
        let out = sync.messages(&result, &world);

        // join-ack, player-joined, then the collectible spawn for everyone else
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].audience, Audience::One(a));
        match &out[0].message {
            ServerMessage::JoinAck(ack) => {
                assert_eq!(ack.player_id, a);
                assert_eq!(ack.snapshot.players.len(), 1);
                assert_eq!(ack.snapshot.collectibles.len(), 1);
            }
            other => panic!("Expected join-ack, got {:?}", other),
        }
        assert!(!out[1].audience.includes(&a));
        assert!(matches!(out[1].message, ServerMessage::PlayerJoined(_)));
        assert!(matches!(out[2].message, ServerMessage::StateDelta(_)));
        assert!(!out[2].audience.includes(&a));
    }

    #[test]
    fn test_delta_skips_joiner() {
        let (mut world, config, sync) = setup(0);
        let a = PlayerId::from_u128(1);
        let b = PlayerId::from_u128(2);
        let queue = RequestQueue::new();

        queue.push_join(a);
        tick(&mut world, queue.drain(), &config);

        // b joins while a collects
        world.collectibles.clear();
        world.player_mut(&a).unwrap().position = GridPos::new(100, 100);
        world.add_collectible(GridPos::new(100, 100), 1).unwrap();
        queue.push_join(b);
        let result = tick(&mut world, queue.drain(), &config);
        let out = sync.messages(&result, &world);

        let delta = out
            .iter()
            .find(|o| matches!(o.message, ServerMessage::StateDelta(_)))
            .expect("delta");
        assert!(delta.audience.includes(&a));
        assert!(!delta.audience.includes(&b));
    }

    #[test]
    fn test_leave_routing() {
        let (mut world, config, sync) = setup(0);
        let a = PlayerId::from_u128(1);
        let queue = RequestQueue::new();
        queue.push_join(a);
        tick(&mut world, queue.drain(), &config);

        queue.push_leave(a);
        let result = tick(&mut world, queue.drain(), &config);
        let out = sync.messages(&result, &world);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].message, ServerMessage::PlayerLeft { id: a });
    }

    #[test]
    fn test_quiet_tick_sends_nothing() {
        let (mut world, config, sync) = setup(0);
        let a = PlayerId::from_u128(1);
        let queue = RequestQueue::new();
        queue.push_join(a);
        tick(&mut world, queue.drain(), &config);

        let result = tick(&mut world, queue.drain(), &config);
        assert!(sync.messages(&result, &world).is_empty());
    }

    #[test]
    fn test_resync_snapshot_to_requester() {
        let (mut world, config, sync) = setup(0);
        let a = PlayerId::from_u128(1);
        let queue = RequestQueue::new();
        queue.push_join(a);
        tick(&mut world, queue.drain(), &config);

        queue.push_resync(a);
        queue.push_resync(a);
        let result = tick(&mut world, queue.drain(), &config);
        let out = sync.messages(&result, &world);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].audience, Audience::One(a));
        assert!(matches!(out[0].message, ServerMessage::Snapshot(ref s) if s.tick == 2));
    }

    #[test]
    fn test_periodic_snapshot_replaces_delta() {
        let (mut world, config, sync) = setup(2);
        let a = PlayerId::from_u128(1);
        let queue = RequestQueue::new();
        queue.push_join(a);
        tick(&mut world, queue.drain(), &config);

        let result = tick(&mut world, queue.drain(), &config);
        let out = sync.messages(&result, &world);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].audience, Audience::All);
        assert!(matches!(out[0].message, ServerMessage::Snapshot(_)));
    }

    #[test]
    fn test_snapshot_interval_disabled() {
        let sync = SyncProtocol::new(&GameConfig {
            snapshot_interval_ticks: 0,
            ..Default::default()
        });
        assert!(!sync.is_snapshot_tick(100));
    }
}
