//! Collision Detection
//!
//! A player collides with a collectible when both occupy exactly the same
//! cell. There is no partial overlap on an integer grid.

use std::collections::BTreeMap;

use crate::core::grid::GridPos;
use crate::game::state::{Collectible, CollectibleId};

/// Ids of every collectible whose cell equals `pos`.
///
/// Linear scan; use [`CollisionIndex`] when querying once per player.
pub fn collectibles_at<'a, I>(pos: GridPos, collectibles: I) -> Vec<CollectibleId>
where
    I: IntoIterator<Item = &'a Collectible>,
{
    collectibles
        .into_iter()
        .filter(|c| c.position == pos)
        .map(|c| c.id)
        .collect()
}

/// Cell -> collectible ids, built once per tick.
///
/// A cell holding several collectibles returns all of them; the caller
/// collects every one and sums the values.
#[derive(Debug, Default)]
pub struct CollisionIndex {
    cells: BTreeMap<GridPos, Vec<CollectibleId>>,
}

impl CollisionIndex {
    /// Index the given collectibles by cell.
    pub fn build<'a, I>(collectibles: I) -> Self
    where
        I: IntoIterator<Item = &'a Collectible>,
    {
        let mut index = Self::default();
        for collectible in collectibles {
            index.insert(collectible);
        }
        index
    }

    /// Add a collectible spawned after the index was built.
    pub fn insert(&mut self, collectible: &Collectible) {
        self.cells.entry(collectible.position).or_default().push(collectible.id);
    }

    /// Collectibles on `pos`, in id order.
    pub fn hits(&self, pos: GridPos) -> &[CollectibleId] {
        self.cells.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove and return everything on `pos`.
    ///
    /// A second player arriving on the same cell later in the tick finds
    /// nothing.
    pub fn take(&mut self, pos: GridPos) -> Vec<CollectibleId> {
        self.cells.remove(&pos).unwrap_or_default()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
