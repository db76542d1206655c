//! Authoritative Simulation Tick
//!
//! One step of the world. Given the same world and the same drained
//! requests, the result is identical.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Deserialize};
use tracing::{debug, trace};

use crate::config::GameConfig;
use crate::game::collision::CollisionIndex;
use crate::game::events::GameEvent;
use crate::game::input::{DrainedRequests, LifecycleRequest};
use crate::game::spawn::ensure_collectible;
use crate::game::state::{CollectibleId, PlayerId, PlayerView, WorldState};

// =============================================================================
// DELTA
// =============================================================================

/// Change to a single collectible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleDelta {
    /// Identifier
    pub id: CollectibleId,
    /// True when the collectible is gone
    pub removed: bool,
    /// X coordinate (new collectibles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    /// Y coordinate (new collectibles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    /// Points awarded (new collectibles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
}

impl CollectibleDelta {
    /// A collectible that was removed.
    pub fn removed(id: CollectibleId) -> Self {
        Self { id, removed: true, x: None, y: None, value: None }
    }
}

/// Entities that changed during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDelta {
    /// Tick the delta belongs to
    pub tick: u64,
    /// Players whose position or score changed
    pub players: Vec<PlayerView>,
    /// Collectibles removed or spawned
    pub collectibles: Vec<CollectibleDelta>,
}

impl WorldDelta {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.collectibles.is_empty()
    }
}

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Tick that was simulated
    pub tick: u64,
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Changed entities
    pub delta: WorldDelta,
}

#[derive(Default)]
struct Changes {
    players: BTreeSet<PlayerId>,
    removed: BTreeSet<CollectibleId>,
    spawned: BTreeSet<CollectibleId>,
}

// =============================================================================
// TICK
// =============================================================================

/// Run one simulation tick.
///
/// # Order
///
/// 0. Advance the tick counter
/// 1. Apply lifecycle requests in arrival order, then the coalesced inputs
/// 2. Move every player (all moves happen before any collision)
/// 3. Resolve collisions in ascending player id order
/// 4. Keep at least one collectible on the board
/// 5. Build the delta
pub fn tick(state: &mut WorldState, requests: DrainedRequests, config: &GameConfig) -> TickResult {
    let mut changes = Changes::default();
    let ranks_before = state.ranks();

    // 0. Advance tick counter
    state.tick += 1;

    // 1. Drain requests
    apply_lifecycle(state, &requests.lifecycle, &mut changes);
    apply_inputs(state, &requests);

    // 2. Movement
    apply_movement(state, config, &mut changes);

    // 3. Collisions
    resolve_collisions(state, config, &mut changes);

    // 4. Nobody collected but the board is empty (first join, earlier spawn failure)
    let rem = state
        .players
        .values()
        .next()
        .map(|p| p.position.remainder(state.bounds.grid_size))
        .unwrap_or((0, 0));
    if let Some(collectible) = ensure_collectible(state, rem, config.max_collectible_value) {
        changes.spawned.insert(collectible.id);
    }

    // 5. Delta (score changes and departures shift other players' ranks)
    let ranks = state.ranks();
    for (id, rank) in &ranks {
        if ranks_before.get(id).is_some_and(|before| before != rank) {
            changes.players.insert(*id);
        }
    }
    let delta = build_delta(state, &changes, &ranks);
    let events = state.take_events();

    trace!(
        "Tick {}: {} events, {} player changes, {} collectible changes",
        state.tick,
        events.len(),
        delta.players.len(),
        delta.collectibles.len()
    );

    TickResult {
        tick: state.tick,
        events,
        delta,
    }
}

fn apply_lifecycle(state: &mut WorldState, requests: &[LifecycleRequest], changes: &mut Changes) {
    let tick = state.tick;

    for request in requests {
        match *request {
            LifecycleRequest::Join(id) => {
                if state.player(&id).is_some() {
                    debug!("Duplicate join for {} ignored", id);
                    continue;
                }
                let player = state.add_player(id);
                debug!("Player {} joined at {}", id, player.position);
                state.push_event(GameEvent::player_joined(tick, id, player.position));
            }
            LifecycleRequest::Leave(id) => {
                if let Some(player) = state.remove_player(&id) {
                    debug!("Player {} left with score {}", id, player.score);
                    changes.players.remove(&id);
                    state.push_event(GameEvent::player_left(tick, id, player.score));
                }
            }
            LifecycleRequest::Resync(id) => {
                if state.player(&id).is_some() {
                    state.push_event(GameEvent::resync_requested(tick, id));
                }
            }
        }
    }
}

fn apply_inputs(state: &mut WorldState, requests: &DrainedRequests) {
    for (id, direction) in &requests.inputs {
        match state.player_mut(id) {
            Some(player) => player.pending_input = Some(*direction),
            None => trace!("Dropping input for unknown player {}", id),
        }
    }
}

fn apply_movement(state: &mut WorldState, config: &GameConfig, changes: &mut Changes) {
    let bounds = state.bounds;
    let speed = config.speed();

    for player in state.players.values_mut() {
        if let Some(direction) = player.pending_input.take() {
            let next = bounds.step(player.position, direction, speed);
            if next != player.position {
                player.position = next;
                changes.players.insert(player.id);
            }
        }
    }
}

fn resolve_collisions(state: &mut WorldState, config: &GameConfig, changes: &mut Changes) {
    let tick = state.tick;
    let grid_size = state.bounds.grid_size;
    let mut index = CollisionIndex::build(state.collectibles.values());

    // BTreeMap order: the lowest id wins a contested cell
    let player_ids: Vec<PlayerId> = state.players.keys().copied().collect();

    for id in player_ids {
        let Some(position) = state.player(&id).map(|p| p.position) else {
            continue;
        };

        let hits = index.take(position);
        if hits.is_empty() {
            continue;
        }

        for collectible_id in hits {
            let Some(collectible) = state.remove_collectible(&collectible_id) else {
                continue;
            };
            let Some(player) = state.player_mut(&id) else {
                continue;
            };
            player.add_score(collectible.value);
            let new_score = player.score;

            debug!(
                "Player {} collected {} (+{}) -> {}",
                id, collectible_id, collectible.value, new_score
            );
            state.push_event(GameEvent::collectible_collected(
                tick,
                id,
                collectible_id,
                collectible.value,
                new_score,
            ));
            changes.removed.insert(collectible_id);
            changes.players.insert(id);
        }

        let rem = position.remainder(grid_size);
        if let Some(spawned) = ensure_collectible(state, rem, config.max_collectible_value) {
            index.insert(&spawned);
            changes.spawned.insert(spawned.id);
        }
    }
}

fn build_delta(
    state: &WorldState,
    changes: &Changes,
    ranks: &BTreeMap<PlayerId, u32>,
) -> WorldDelta {
    let players = changes
        .players
        .iter()
        .filter_map(|id| Some(state.player(id)?.view(*ranks.get(id)?)))
        .collect();

    let mut collectibles = Vec::new();
    for id in changes.removed.difference(&changes.spawned) {
        collectibles.push(CollectibleDelta::removed(*id));
    }
    for id in changes.spawned.difference(&changes.removed) {
        if let Some(c) = state.collectible(id) {
            collectibles.push(CollectibleDelta {
                id: *id,
                removed: false,
                x: Some(c.position.x),
                y: Some(c.position.y),
                value: Some(c.value),
            });
        }
    }

    WorldDelta {
        tick: state.tick,
        players,
        collectibles,
    }
}

// =============================================================================
// TESTS
// =============================================================================
