//! Deterministic builders shared by unit and integration tests.

use crate::grid::{GRID_SIZE, Grid, Position};
use itertools::Itertools;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Build a grid with the given kinds laid out row by row (row 0 on
/// top). `kinds` must cover every kind used in `rows` so gravity
/// refills draw from the same pool.
pub fn grid_from_rows(
    kinds: u8,
    rows: [[u8; GRID_SIZE]; GRID_SIZE],
) -> Grid {
    let mut rng = seeded_rng(0);
    let mut grid = Grid::random(kinds, &mut rng);
    for (y, row) in rows.iter().enumerate() {
        for (x, &kind) in row.iter().enumerate() {
            assert!(kind < kinds, "kind {kind} outside pool of {kinds}");
            grid.set_kind(Position::new(x, y), kind);
        }
    }
    grid
}

/// Two-kind checkerboard: no 3-run anywhere and no valid move, by
/// construction. The canonical quiet (and deadlocked) board.
pub fn checkerboard_rows() -> [[u8; GRID_SIZE]; GRID_SIZE] {
    let mut rows = [[0u8; GRID_SIZE]; GRID_SIZE];
    for (y, row) in rows.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = ((x + y) % 2) as u8;
        }
    }
    rows
}

/// Tile kinds on the board, as a multiset.
pub fn kind_multiset(grid: &Grid) -> HashMap<u8, usize> {
    Grid::positions().map(|p| grid.kind_at(p)).counts()
}
