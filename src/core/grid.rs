//! Integer Grid Geometry
//!
//! Positions, movement directions and world bounds. All coordinates are
//! integer grid units with the origin at the top-left corner; `y` grows
//! downward, so moving `Up` decreases `y`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// POSITION
// =============================================================================

/// A position on the world grid.
///
/// Ordered by `(x, y)` so it can key a `BTreeMap`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate (grows downward).
    pub y: i32,
}

impl GridPos {
    /// Create a position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by `(dx, dy)` without any bounds handling.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Per-axis remainder modulo the cell size.
    #[inline]
    pub fn remainder(self, grid_size: i32) -> (i32, i32) {
        (self.x.rem_euclid(grid_size), self.y.rem_euclid(grid_size))
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Movement direction requested by a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward `y = 0`.
    Up,
    /// Toward `y = height`.
    Down,
    /// Toward `x = 0`.
    Left,
    /// Toward `x = width`.
    Right,
}

/// Error for wire values that are not one of the four directions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid direction: {0:?}")]
pub struct InvalidDirection(pub String);

impl Direction {
    /// All directions.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Displacement for one tick at `speed`.
    #[inline]
    pub fn delta(self, speed: i32) -> (i32, i32) {
        match self {
            Self::Up => (0, -speed),
            Self::Down => (0, speed),
            Self::Left => (-speed, 0),
            Self::Right => (speed, 0),
        }
    }
}

impl FromStr for Direction {
    type Err = InvalidDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WORLD BOUNDS
// =============================================================================

/// World extent `[0, width) x [0, height)` and the spawn cell size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Width in grid units.
    pub width: i32,
    /// Height in grid units.
    pub height: i32,
    /// Cell size for spawn alignment.
    pub grid_size: i32,
}

impl WorldBounds {
    /// Create bounds. Callers validate that all values are positive.
    pub const fn new(width: i32, height: i32, grid_size: i32) -> Self {
        Self { width, height, grid_size }
    }

    /// Check whether a position lies inside the world.
    #[inline]
    pub fn contains(&self, pos: GridPos) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    /// Number of cell columns whose origin, shifted by `rem`, is in bounds.
    #[inline]
    pub fn columns(&self, rem: i32) -> i32 {
        axis_cells(self.width, self.grid_size, rem)
    }

    /// Number of cell rows whose origin, shifted by `rem`, is in bounds.
    #[inline]
    pub fn rows(&self, rem: i32) -> i32 {
        axis_cells(self.height, self.grid_size, rem)
    }

    /// Position of cell `(col, row)` shifted by `rem`.
    #[inline]
    pub fn cell(&self, col: i32, row: i32, rem: (i32, i32)) -> GridPos {
        GridPos::new(col * self.grid_size + rem.0, row * self.grid_size + rem.1)
    }

    /// Move `pos` one step in `dir`.
    ///
    /// A step that would leave the world is cut short at the furthest
    /// in-bounds point reachable by whole steps, so the player keeps its
    /// remainder modulo `speed` and positions never wrap.
    pub fn step(&self, pos: GridPos, dir: Direction, speed: i32) -> GridPos {
        let (dx, dy) = dir.delta(speed);
        GridPos::new(
            clamp_axis(pos.x, pos.x.saturating_add(dx), self.width),
            clamp_axis(pos.y, pos.y.saturating_add(dy), self.height),
        )
    }
}

fn axis_cells(extent: i32, grid_size: i32, rem: i32) -> i32 {
    if rem >= extent {
        return 0;
    }
    (extent - rem + grid_size - 1) / grid_size
}

fn clamp_axis(from: i32, to: i32, extent: i32) -> i32 {
    if (0..extent).contains(&to) {
        return to;
    }
    let limit = to.clamp(0, extent - 1);
    let step = (to - from).abs().max(1);
    (from + ((limit - from) / step) * step).clamp(0, extent - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: WorldBounds = WorldBounds::new(640, 480, 10);

    #[test]
    fn test_direction_parse() {
        assert_eq!("up".parse::<Direction>(), Ok(Direction::Up));
        assert_eq!("right".parse::<Direction>(), Ok(Direction::Right));
        assert!("north".parse::<Direction>().is_err());
        assert!("UP".parse::<Direction>().is_err());
        assert!("".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_delta() {
        // Screen coordinates: up decreases y
        assert_eq!(Direction::Up.delta(5), (0, -5));
        assert_eq!(Direction::Down.delta(5), (0, 5));
        assert_eq!(Direction::Left.delta(5), (-5, 0));
        assert_eq!(Direction::Right.delta(5), (5, 0));
    }

    #[test]
    fn test_direction_serde_lowercase() {
        let json = serde_json::to_string(&Direction::Left).unwrap();
        assert_eq!(json, "\"left\"");
    }

    #[test]
    fn test_step_inside() {
        let pos = BOUNDS.step(GridPos::new(100, 100), Direction::Right, 5);
        assert_eq!(pos, GridPos::new(105, 100));
    }

    #[test]
    fn test_step_never_wraps() {
        assert_eq!(BOUNDS.step(GridPos::new(0, 0), Direction::Left, 5), GridPos::new(0, 0));
        assert_eq!(BOUNDS.step(GridPos::new(0, 0), Direction::Up, 5), GridPos::new(0, 0));
        let corner = GridPos::new(635, 475);
        assert_eq!(BOUNDS.step(corner, Direction::Right, 5), corner);
        assert_eq!(BOUNDS.step(corner, Direction::Down, 5), corner);
    }

    #[test]
    fn test_step_keeps_lattice() {
        // 643 is not a multiple of the step; the player stops at 640, not 642
        let bounds = WorldBounds::new(643, 480, 10);
        assert_eq!(bounds.step(GridPos::new(640, 0), Direction::Right, 5), GridPos::new(640, 0));
        assert_eq!(bounds.step(GridPos::new(635, 0), Direction::Right, 5), GridPos::new(640, 0));

        // Off-lattice start near zero stays put rather than snapping to 0
        assert_eq!(bounds.step(GridPos::new(3, 3), Direction::Left, 5), GridPos::new(3, 3));
    }

    #[test]
    fn test_contains() {
        assert!(BOUNDS.contains(GridPos::new(0, 0)));
        assert!(BOUNDS.contains(GridPos::new(639, 479)));
        assert!(!BOUNDS.contains(GridPos::new(640, 0)));
        assert!(!BOUNDS.contains(GridPos::new(0, -1)));
    }

    #[test]
    fn test_cell_counts() {
        assert_eq!(BOUNDS.columns(0), 64);
        assert_eq!(BOUNDS.rows(0), 48);
        assert_eq!(BOUNDS.columns(5), 64);

        let odd = WorldBounds::new(645, 480, 10);
        assert_eq!(odd.columns(0), 65);
        assert_eq!(odd.columns(5), 64);
        assert_eq!(odd.columns(700), 0);
    }

    #[test]
    fn test_remainder() {
        assert_eq!(GridPos::new(105, 30).remainder(10), (5, 0));
        assert_eq!(GridPos::new(-5, 0).remainder(10), (5, 0));
    }
}
