use crate::grid::{GRID_SIZE, Grid, Position};
use crate::matches::find_all_matches;

/// Whether two positions may be swapped at all: orthogonally adjacent,
/// nothing else. Whether the swap is *productive* is a separate
/// question answered by [`swap_creates_match`].
pub fn can_swap(a: Position, b: Position) -> bool {
    a.is_adjacent(b)
}

/// Pure speculative swap. Applying it twice with the same arguments
/// returns the original grid, which is exactly how a rejected swap is
/// reverted.
pub fn swap_tiles(grid: &Grid, a: Position, b: Position) -> Grid {
    grid.swapped(a, b)
}

/// Would swapping `a` and `b` produce at least one match? Checks
/// adjacency first; diagonal or distant pairs are never productive.
pub fn swap_creates_match(grid: &Grid, a: Position, b: Position) -> bool {
    if !can_swap(a, b) {
        return false;
    }
    !find_all_matches(&grid.swapped(a, b)).is_empty()
}

/// Deadlock primitive: does any adjacent pair yield a match when
/// swapped? Each cell only probes its right and down neighbor, so each
/// pair is tried once. O(cells x 2) speculative swaps; fine at 8x8.
pub fn has_valid_moves(grid: &Grid) -> bool {
    for pos in Grid::positions() {
        if pos.x + 1 < GRID_SIZE
            && swap_creates_match(grid, pos, Position::new(pos.x + 1, pos.y))
        {
            return true;
        }
        if pos.y + 1 < GRID_SIZE
            && swap_creates_match(grid, pos, Position::new(pos.x, pos.y + 1))
        {
            return true;
        }
    }
    false
}
