//! World State (Entity Store)
//!
//! Registry of players and collectibles keyed by identifier.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::core::grid::{Direction, GridPos, WorldBounds};
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, compute_state_hash, to_hex};
use crate::game::events::GameEvent;
use crate::game::spawn;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique player identifier, minted per connection.
///
/// Implements Ord for deterministic BTreeMap ordering and serializes as a
/// hyphenated UUID string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Mint a fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build from a fixed integer (handy for reproducible setups).
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parse from a UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Collectible identifier. Monotonic, never reused within a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectibleId(pub u64);

impl fmt::Display for CollectibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A connected player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    /// Identifier
    pub id: PlayerId,
    /// Current cell
    pub position: GridPos,
    /// Accumulated score (never decreases)
    pub score: u64,
    /// Direction to apply on the next tick
    pub pending_input: Option<Direction>,
}

impl Player {
    /// Create a player with zero score.
    pub fn new(id: PlayerId, position: GridPos) -> Self {
        Self {
            id,
            position,
            score: 0,
            pending_input: None,
        }
    }

    /// Add points. Saturates instead of wrapping.
    #[inline]
    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points as u64);
    }

    /// Wire view of this player at the given standing.
    pub fn view(&self, rank: u32) -> PlayerView {
        PlayerView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            score: self.score,
            rank,
        }
    }
}

/// An item that awards points when a player lands on its cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collectible {
    /// Identifier
    pub id: CollectibleId,
    /// Cell
    pub position: GridPos,
    /// Points awarded (always positive)
    pub value: u32,
}

impl Collectible {
    /// Wire view of this collectible.
    pub fn view(&self) -> CollectibleView {
        CollectibleView {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            value: self.value,
        }
    }
}

/// Entity store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Collectibles must be worth something.
    #[error("Collectible value must be positive")]
    ZeroValue,

    /// Position is outside the world.
    #[error("Position {0} is outside the world")]
    OutOfBounds(GridPos),
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Player as seen by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Identifier
    pub id: PlayerId,
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Score
    pub score: u64,
    /// Standing by score, 1 is the leader
    pub rank: u32,
}

/// Collectible as seen by clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleView {
    /// Identifier
    pub id: CollectibleId,
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Points awarded
    pub value: u32,
}

/// Immutable view of the whole world at the end of a tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    /// Tick the snapshot was taken at
    pub tick: u64,
    /// Players sorted by id
    pub players: Vec<PlayerView>,
    /// Collectibles sorted by id
    pub collectibles: Vec<CollectibleView>,
    /// Hex SHA-256 of the world
    pub state_hash: String,
}

// =============================================================================
// WORLD STATE
// =============================================================================

/// Complete world state. Owned by the game loop.
#[derive(Clone, Debug)]
pub struct WorldState {
    /// Ticks completed so far
    pub tick: u64,

    /// RNG seed (for reproduction)
    pub rng_seed: u64,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// World extent and cell size
    pub bounds: WorldBounds,

    /// Random placement attempts before the scan fallback
    pub spawn_attempts: u32,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,

    /// All collectibles (BTreeMap for deterministic iteration)
    pub collectibles: BTreeMap<CollectibleId, Collectible>,

    /// Next collectible ID (monotonic counter)
    pub next_collectible_id: u64,

    /// Events generated this tick (cleared each tick)
    pub pending_events: Vec<GameEvent>,
}

impl WorldState {
    /// Create an empty world.
    pub fn new(bounds: WorldBounds, rng_seed: u64) -> Self {
        Self {
            tick: 0,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            bounds,
            spawn_attempts: 32,
            players: BTreeMap::new(),
            collectibles: BTreeMap::new(),
            next_collectible_id: 0,
            pending_events: Vec::new(),
        }
    }

    /// Create an empty world from configuration.
    pub fn from_config(config: &GameConfig, rng_seed: u64) -> Self {
        let mut world = Self::new(config.bounds(), rng_seed);
        world.spawn_attempts = config.spawn_attempts;
        world
    }

    /// Add a player at a random free cell with score 0.
    ///
    /// Adding an id that is already present returns the existing player
    /// unchanged.
    pub fn add_player(&mut self, id: PlayerId) -> Player {
        if let Some(existing) = self.players.get(&id) {
            return existing.clone();
        }

        let position = spawn::player_cell(self);
        let player = Player::new(id, position);
        self.players.insert(id, player.clone());
        player
    }

    /// Remove a player. Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Get a player by ID.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Place a collectible with a fresh id.
    pub fn add_collectible(
        &mut self,
        position: GridPos,
        value: u32,
    ) -> Result<Collectible, StoreError> {
        if value == 0 {
            return Err(StoreError::ZeroValue);
        }
        if !self.bounds.contains(position) {
            return Err(StoreError::OutOfBounds(position));
        }

        let id = CollectibleId(self.next_collectible_id);
        self.next_collectible_id += 1;
        let collectible = Collectible { id, position, value };
        self.collectibles.insert(id, collectible.clone());
        Ok(collectible)
    }

    /// Remove a collectible. Unknown ids are a no-op.
    pub fn remove_collectible(&mut self, id: &CollectibleId) -> Option<Collectible> {
        self.collectibles.remove(id)
    }

    /// Get a collectible by ID.
    pub fn collectible(&self, id: &CollectibleId) -> Option<&Collectible> {
        self.collectibles.get(id)
    }

    /// First collectible on `pos`, if any.
    pub fn collectible_at(&self, pos: GridPos) -> Option<&Collectible> {
        self.collectibles.values().find(|c| c.position == pos)
    }

    /// Current tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Standings: score descending, ties broken by ascending id.
    ///
    /// Every player gets a distinct rank in `1..=player_count()`.
    pub fn ranks(&self) -> BTreeMap<PlayerId, u32> {
        let mut order: Vec<&Player> = self.players.values().collect();
        order.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));

        order
            .into_iter()
            .zip(1u32..)
            .map(|(player, rank)| (player.id, rank))
            .collect()
    }

    /// Rank of a single player.
    pub fn rank(&self, id: &PlayerId) -> Option<u32> {
        let player = self.players.get(id)?;
        let ahead = self
            .players
            .values()
            .filter(|p| p.score > player.score || (p.score == player.score && p.id < player.id))
            .count();
        Some(ahead as u32 + 1)
    }

    /// Wire view of a player, including its current rank.
    pub fn player_view(&self, id: &PlayerId) -> Option<PlayerView> {
        let rank = self.rank(id)?;
        self.players.get(id).map(|p| p.view(rank))
    }

    /// Number of connected players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of live collectibles.
    pub fn collectible_count(&self) -> usize {
        self.collectibles.len()
    }

    /// Record an event for this tick.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Take all events recorded so far.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Compute hash of current state.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            for player in self.players.values() {
                hasher.update_uuid(player.id.as_bytes());
                hasher.update_pos(player.position);
                hasher.update_u64(player.score);
            }

            for collectible in self.collectibles.values() {
                hasher.update_u64(collectible.id.0);
                hasher.update_pos(collectible.position);
                hasher.update_u32(collectible.value);
            }
        })
    }

    /// Immutable view for broadcast.
    pub fn snapshot(&self) -> WorldSnapshot {
        let ranks = self.ranks();
        WorldSnapshot {
            tick: self.tick,
            players: self
                .players
                .values()
                .map(|p| p.view(ranks.get(&p.id).copied().unwrap_or_default()))
                .collect(),
            collectibles: self.collectibles.values().map(Collectible::view).collect(),
            state_hash: to_hex(&self.compute_hash()),
        }
    }
}
