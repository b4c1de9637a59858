use crate::types::Position;

/// Obstacle-blind walk back to the origin, one unit per axis per tick.
///
/// Returns every intermediate position, ending with the origin. Empty when
/// already there.
#[must_use]
pub fn emergency_return_path(from: Position) -> Vec<Position> {
    std::iter::successors(Some(from), |cell| {
        (!cell.is_origin()).then(|| cell.offset(-cell.x.signum(), -cell.y.signum()))
    })
    .skip(1)
    .collect()
}
