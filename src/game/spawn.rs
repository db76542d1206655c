//! Spawn Policy
//!
//! Chooses cells for new players and collectibles.
//!
//! Collectibles are placed on cells whose coordinates share the remainder
//! (modulo `grid_size`) of the player that emptied the board. Player
//! movement preserves that remainder, so the new collectible is always
//! reachable by exact-equality collision. Do not drop the alignment.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::core::grid::{GridPos, WorldBounds};
use crate::core::rng::DeterministicRng;
use crate::game::events::GameEvent;
use crate::game::state::{Collectible, StoreError, WorldState};

/// Spawn errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    /// Every candidate cell is taken (or none fit the world).
    #[error("No free cell with remainder {0:?}")]
    NoFreeCell((i32, i32)),

    /// The store refused the placement.
    #[error("Store rejected spawn: {0}")]
    Store(#[from] StoreError),
}

/// Find a cell with remainder `rem` for which `is_taken` is false.
///
/// Tries `attempts` random cells, then scans every candidate from a random
/// starting offset so a free cell is found whenever one exists.
pub fn find_free_cell<F>(
    rng: &mut DeterministicRng,
    bounds: &WorldBounds,
    rem: (i32, i32),
    attempts: u32,
    is_taken: F,
) -> Result<GridPos, SpawnError>
where
    F: Fn(GridPos) -> bool,
{
    let cols = bounds.columns(rem.0) as u64;
    let rows = bounds.rows(rem.1) as u64;
    let total = cols * rows;
    if total == 0 {
        return Err(SpawnError::NoFreeCell(rem));
    }

    for _ in 0..attempts {
        if let Some(pos) = rng.random_cell(bounds, rem) {
            if !is_taken(pos) {
                return Ok(pos);
            }
        }
    }

    let start = rng.next_u64() % total;
    for i in 0..total {
        let idx = (start + i) % total;
        let pos = bounds.cell((idx % cols) as i32, (idx / cols) as i32, rem);
        if !is_taken(pos) {
            return Ok(pos);
        }
    }

    Err(SpawnError::NoFreeCell(rem))
}

/// Pick a grid-aligned cell for a joining player.
///
/// Prefers cells without collectibles or players. Players may share a cell
/// when the world is full.
pub fn player_cell(world: &mut WorldState) -> GridPos {
    let taken = occupied_cells(world, true);
    let attempts = world.spawn_attempts;

    find_free_cell(&mut world.rng, &world.bounds, (0, 0), attempts, |pos| {
        taken.contains(&pos)
    })
    .or_else(|_| {
        world
            .rng
            .random_cell(&world.bounds, (0, 0))
            .ok_or(SpawnError::NoFreeCell((0, 0)))
    })
    .unwrap_or_default()
}

/// Place one collectible aligned to `rem`.
///
/// Avoids player cells when possible; never stacks on another collectible.
pub fn spawn_collectible(
    world: &mut WorldState,
    rem: (i32, i32),
    max_value: u32,
) -> Result<Collectible, SpawnError> {
    let attempts = world.spawn_attempts;

    let all_taken = occupied_cells(world, true);
    let position = match find_free_cell(&mut world.rng, &world.bounds, rem, attempts, |pos| {
        all_taken.contains(&pos)
    }) {
        Ok(pos) => pos,
        Err(_) => {
            let collectible_cells = occupied_cells(world, false);
            find_free_cell(&mut world.rng, &world.bounds, rem, attempts, |pos| {
                collectible_cells.contains(&pos)
            })?
        }
    };

    let value = world.rng.next_int_range(1, max_value.max(1) as i32) as u32;
    Ok(world.add_collectible(position, value)?)
}

/// Keep at least one collectible on the board while anyone is playing.
///
/// Failures are logged and recorded as a `SpawnFailed` event; the next
/// tick tries again.
pub fn ensure_collectible(
    world: &mut WorldState,
    rem: (i32, i32),
    max_value: u32,
) -> Option<Collectible> {
    if world.players.is_empty() || !world.collectibles.is_empty() {
        return None;
    }

    let tick = world.tick;
    match spawn_collectible(world, rem, max_value) {
        Ok(collectible) => {
            debug!(
                "Spawned collectible {} at {} worth {}",
                collectible.id, collectible.position, collectible.value
            );
            world.push_event(GameEvent::collectible_spawned(
                tick,
                collectible.id,
                collectible.position,
                collectible.value,
            ));
            Some(collectible)
        }
        Err(e) => {
            warn!("Collectible spawn failed at tick {}: {}", tick, e);
            world.push_event(GameEvent::spawn_failed(tick));
            None
        }
    }
}

fn occupied_cells(world: &WorldState, include_players: bool) -> BTreeSet<GridPos> {
    let mut cells: BTreeSet<GridPos> = world.collectibles.values().map(|c| c.position).collect();
    if include_players {
        cells.extend(world.players.values().map(|p| p.position));
    }
    cells
}
