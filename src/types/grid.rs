use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default upper coordinate on both axes.
pub const GRID_MAX: i32 = 9;

/// Integer grid coordinate.
///
/// Coordinates are signed so that out-of-range proposals from external
/// sources can be represented and rejected instead of silently wrapped.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn is_origin(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    #[must_use]
    pub const fn manhattan(&self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// King-move distance: diagonal steps count as one.
    #[must_use]
    pub const fn chebyshev(&self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Bounded square grid `[0, max] x [0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    max: i32,
}

impl Grid {
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { max }
    }

    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    #[must_use]
    pub const fn contains(&self, position: Position) -> bool {
        position.x >= 0 && position.x <= self.max && position.y >= 0 && position.y <= self.max
    }

    /// Last-resort target when a goal names no coordinates.
    #[must_use]
    pub const fn center(&self) -> Position {
        let mid = self.max / 2 + self.max % 2;
        Position::new(mid, mid)
    }

    /// Number of cells along one side.
    #[must_use]
    pub const fn side(&self) -> usize {
        (self.max.unsigned_abs() as usize).saturating_add(1)
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(GRID_MAX)
    }
}

/// Static obstacle layout for one mission. Never contains the origin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Position>", into = "Vec<Position>")]
pub struct ObstacleSet(BTreeSet<Position>);

impl ObstacleSet {
    #[must_use]
    pub fn new(positions: impl IntoIterator<Item = Position>) -> Self {
        Self(
            positions
                .into_iter()
                .filter(|position| !position.is_origin())
                .collect(),
        )
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Random layout of up to `count` distinct cells, giving up after
    /// `max_attempts` draws.
    #[must_use]
    pub fn random<R: Rng + ?Sized>(
        grid: Grid,
        count: usize,
        max_attempts: usize,
        rng: &mut R,
    ) -> Self {
        let mut cells = BTreeSet::new();
        let mut attempts = 0;
        while cells.len() < count && attempts < max_attempts {
            attempts += 1;
            let candidate = Position::new(rng.gen_range(0..=grid.max()), rng.gen_range(0..=grid.max()));
            if !candidate.is_origin() {
                cells.insert(candidate);
            }
        }
        Self(cells)
    }

    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.0.contains(&position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.0.iter()
    }
}

impl From<Vec<Position>> for ObstacleSet {
    fn from(value: Vec<Position>) -> Self {
        Self::new(value)
    }
}

impl From<ObstacleSet> for Vec<Position> {
    fn from(value: ObstacleSet) -> Self {
        value.0.into_iter().collect()
    }
}

impl fmt::Display for ObstacleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0.iter().join(", "))
        }
    }
}
