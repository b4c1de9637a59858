#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::types::{Grid, ObstacleSet, Position};

/// Default extra Manhattan distance a detour may add.
pub const DEFAULT_DETOUR_SLACK: u32 = 2;

const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Proposes the next single-cell move from `current` toward `target`.
///
/// Greedy first: larger-delta axis, then the other axis, then the diagonal
/// (diagonal first when both deltas are equal). When every greedy cell is
/// blocked, the best of the eight neighbours whose distance stays within
/// `detour_slack` of the current distance is taken. Returns `current` when
/// already on target or when no admissible neighbour exists.
#[must_use]
pub fn next_move(
    current: Position,
    target: Position,
    obstacles: &ObstacleSet,
    grid: Grid,
    detour_slack: u32,
) -> Position {
    if current == target {
        return current;
    }

    let is_free = |cell: &Position| grid.contains(*cell) && !obstacles.contains(*cell);

    if let Some(cell) = greedy_candidates(current, target)
        .into_iter()
        .find(|cell| is_free(cell))
    {
        return cell;
    }

    let limit = current.manhattan(target).saturating_add(detour_slack);
    NEIGHBORS
        .iter()
        .map(|(dx, dy)| current.offset(*dx, *dy))
        .filter(|cell| is_free(cell))
        .map(|cell| (cell, cell.manhattan(target)))
        .filter(|(_, distance)| *distance <= limit)
        .min_by_key(|(_, distance)| *distance)
        .map_or(current, |(cell, _)| cell)
}

/// Whether an externally suggested move is worth validating at all.
///
/// It must be a single king move that reaches the target or strictly
/// reduces the Manhattan distance to it.
#[must_use]
pub const fn plausible_candidate(current: Position, target: Position, candidate: Position) -> bool {
    if current.chebyshev(candidate) != 1 {
        return false;
    }
    (candidate.x == target.x && candidate.y == target.y)
        || candidate.manhattan(target) < current.manhattan(target)
}

fn greedy_candidates(current: Position, target: Position) -> Vec<Position> {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let sx = dx.signum();
    let sy = dy.signum();

    let along_x = current.offset(sx, 0);
    let along_y = current.offset(0, sy);
    let diagonal = current.offset(sx, sy);

    let ordered = if dx.abs() == dy.abs() {
        [diagonal, along_x, along_y]
    } else if dx.abs() > dy.abs() {
        [along_x, along_y, diagonal]
    } else {
        [along_y, along_x, diagonal]
    };

    ordered.into_iter().fold(Vec::with_capacity(3), |mut acc, cell| {
        if cell != current && !acc.contains(&cell) {
            acc.push(cell);
        }
        acc
    })
}
