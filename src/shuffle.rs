use crate::grid::{GRID_SIZE, Grid, Position};
use crate::matches::find_all_matches;
use crate::moves::has_valid_moves;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::warn;

/// Redeal attempts before falling back to a fresh board.
const SHUFFLE_ATTEMPTS: usize = 24;
const FRESH_BOARD_ATTEMPTS: usize = 16;

/// Redistribute the existing tile kinds across the board until it is
/// playable again. Each attempt redeals the current kind multiset
/// (ids stay in place; only kinds move) while refusing to complete a
/// 3-run, so an accepted board is match-free by construction; it is
/// then accepted once it also has at least one valid move. If the
/// multiset is too degenerate to redeal (e.g. almost the whole board a
/// single kind) the board is replaced wholesale with a fresh
/// match-free fill.
pub fn shuffle_grid(grid: &Grid, rng: &mut impl Rng) -> Grid {
    for _ in 0..SHUFFLE_ATTEMPTS {
        let Some(candidate) = redeal_multiset(grid, rng) else {
            continue;
        };
        if has_valid_moves(&candidate) {
            debug_assert!(find_all_matches(&candidate).is_empty());
            return candidate;
        }
    }

    warn!("shuffle retry budget exhausted; dealing a fresh board");
    let mut fallback = Grid::settled_random(grid.kinds(), rng);
    for _ in 0..FRESH_BOARD_ATTEMPTS {
        if has_valid_moves(&fallback) {
            return fallback;
        }
        fallback = Grid::settled_random(grid.kinds(), rng);
    }
    fallback
}

/// One greedy redeal pass: walk the board row-major, at each cell
/// drawing a kind from the remaining multiset that does not complete a
/// 3-run with the two placed neighbors to the left or above. Returns
/// `None` when the endgame leaves only forbidden kinds.
fn redeal_multiset(grid: &Grid, rng: &mut impl Rng) -> Option<Grid> {
    let mut pool: Vec<u8> = Grid::positions().map(|p| grid.kind_at(p)).collect();
    pool.shuffle(rng);

    let mut candidate = grid.clone();
    for pos in Grid::positions() {
        let forbidden_left = (pos.x >= 2).then(|| {
            let a = candidate.kind_at(Position::new(pos.x - 1, pos.y));
            let b = candidate.kind_at(Position::new(pos.x - 2, pos.y));
            (a == b).then_some(a)
        });
        let forbidden_up = (pos.y >= 2).then(|| {
            let a = candidate.kind_at(Position::new(pos.x, pos.y - 1));
            let b = candidate.kind_at(Position::new(pos.x, pos.y - 2));
            (a == b).then_some(a)
        });
        let forbidden = [forbidden_left.flatten(), forbidden_up.flatten()];

        let slot = pool
            .iter()
            .position(|kind| !forbidden.contains(&Some(*kind)))?;
        let kind = pool.swap_remove(slot);
        candidate.set_kind(pos, kind);
    }
    debug_assert_eq!(pool.len(), 0);
    Some(candidate)
}
