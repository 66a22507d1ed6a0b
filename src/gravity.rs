use crate::grid::{GRID_SIZE, Grid, Position};
use rand::Rng;

/// Drop every `matched` tile out of the board, compact each column
/// toward the bottom preserving relative order, and spawn fresh random
/// tiles into the vacated top cells. Columns are independent, so the
/// processing order is irrelevant.
///
/// The returned grid carries no `matched` flags: removed tiles are
/// physically replaced, never merely unflagged. Survivors that moved
/// and every spawned tile are flagged `falling` for the UI.
pub fn apply_gravity(grid: &Grid, rng: &mut impl Rng) -> Grid {
    let mut next = grid.clone();

    for x in 0..GRID_SIZE {
        // Survivors top-to-bottom, keeping their original row for the
        // fall flag.
        let survivors: Vec<(usize, crate::grid::Tile)> = (0..GRID_SIZE)
            .map(|y| (y, grid.tile(Position::new(x, y))))
            .filter(|(_, tile)| !tile.matched)
            .collect();
        let vacancies = GRID_SIZE - survivors.len();

        for (slot, (old_y, mut tile)) in survivors.into_iter().enumerate() {
            let y = vacancies + slot;
            tile.falling = y != old_y;
            next.set_tile(Position::new(x, y), tile);
        }
        for y in 0..vacancies {
            let kind = rng.random_range(0..grid.kinds());
            let mut tile = next.mint_tile(kind);
            tile.falling = true;
            next.set_tile(Position::new(x, y), tile);
        }
    }

    next
}
