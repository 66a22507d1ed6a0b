use crate::gravity::apply_gravity;
use crate::grid::{Grid, Position};
use crate::level::match_score;
use crate::matches::find_all_matches;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::warn;

/// Hard ceiling on match->gravity iterations per triggering event.
/// Unreachable with a correct detector and gravity; hitting it means a
/// bug, and the board is force-cleared rather than left inconsistent.
pub const CASCADE_LIMIT: usize = 10;

/// One settled iteration of the cascade, kept for UI replay: the board
/// with the matched tiles highlighted, then the board after gravity.
#[derive(Clone, Debug)]
pub struct CascadeStep {
    pub matched: BTreeSet<Position>,
    pub highlight: Grid,
    pub settled: Grid,
    pub score_gained: u32,
    pub bonus_secs: u32,
}

#[derive(Clone, Debug)]
pub struct CascadeOutcome {
    pub grid: Grid,
    pub score_gained: u32,
    pub bonus_secs: u32,
    pub steps: Vec<CascadeStep>,
    pub forced_clear: bool,
}

impl CascadeOutcome {
    pub fn cascades(&self) -> u32 {
        self.steps.len() as u32
    }
}

/// Drive repeated match -> score -> gravity cycles until the board
/// settles. Iteration `i` (0-based) scores `match_score(n) * (i + 1)`,
/// so later links in a chain are worth proportionally more. Runs of
/// the reserved time-bonus kind accrue countdown seconds on the side.
///
/// Stops early once `score_before` plus the running gain reaches
/// `target_score`: the win condition supersedes further scoring.
pub fn resolve_cascades(
    grid: Grid,
    score_before: u32,
    target_score: u32,
    rng: &mut impl Rng,
) -> CascadeOutcome {
    let mut grid = grid.with_flags_cleared();
    let mut steps: Vec<CascadeStep> = Vec::new();
    let mut score_gained = 0u32;
    let mut bonus_secs = 0u32;
    let mut won_early = false;

    for cascade in 0..CASCADE_LIMIT {
        let matches = find_all_matches(&grid);
        if matches.is_empty() {
            break;
        }
        let matched = matches.positions();
        let highlight = grid.with_matched(matched.iter().copied());
        let gained = match_score(matched.len()) * (cascade as u32 + 1);
        let secs = matches.time_bonus_secs();
        score_gained += gained;
        bonus_secs += secs;

        let settled = apply_gravity(&highlight, rng).with_flags_cleared();
        grid = settled.clone();
        steps.push(CascadeStep {
            matched,
            highlight,
            settled,
            score_gained: gained,
            bonus_secs: secs,
        });

        if score_before + score_gained >= target_score {
            won_early = true;
            break;
        }
    }

    // Never hand back a grid that still holds matches, unless the win
    // already ended the resolution.
    let mut forced_clear = false;
    if !won_early {
        let leftovers = find_all_matches(&grid);
        if !leftovers.is_empty() {
            warn!(
                cascades = steps.len(),
                "cascade ceiling hit with matches remaining; force-clearing"
            );
            let flagged = grid.with_matched(leftovers.positions());
            grid = apply_gravity(&flagged, rng).with_flags_cleared();
            forced_clear = true;
        }
    }

    CascadeOutcome {
        grid,
        score_gained,
        bonus_secs,
        steps,
        forced_clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GRID_SIZE, TIME_BONUS_KIND};
    use crate::level::match_score;
    use crate::test_helpers::{checkerboard_rows, grid_from_rows, seeded_rng};

    #[test]
    fn resolve_cascades__settles_a_quiet_board_without_steps() {
        let grid = grid_from_rows(6, checkerboard_rows());
        let outcome = resolve_cascades(grid, 0, u32::MAX, &mut seeded_rng(1));
        assert_eq!(outcome.cascades(), 0);
        assert_eq!(outcome.score_gained, 0);
        assert!(!outcome.forced_clear);
    }

    #[test]
    fn resolve_cascades__scores_a_single_triple_at_base_rate() {
        let mut rows = checkerboard_rows();
        rows[7] = [4, 4, 4, 0, 1, 0, 1, 0];
        let grid = grid_from_rows(6, rows);

        let outcome = resolve_cascades(grid, 0, u32::MAX, &mut seeded_rng(2));
        assert!(outcome.cascades() >= 1);
        assert_eq!(outcome.steps[0].score_gained, match_score(3));
        assert_eq!(outcome.steps[0].matched.len(), 3);
    }

    #[test]
    fn resolve_cascades__applies_the_combo_multiplier_per_iteration() {
        // a column seeded so clearing the bottom triple drops another
        // triple into place: kind 4 at rows 5-7, kind 5 above it in
        // the same column plus two neighbors on the landing row
        let mut rows = checkerboard_rows();
        rows[5][0] = 4;
        rows[6][0] = 4;
        rows[7][0] = 4;
        rows[2][0] = 5;
        rows[3][0] = 5;
        rows[4][0] = 5;
        rows[7][1] = 5;
        rows[7][2] = 5;
        let grid = grid_from_rows(6, rows);

        let outcome = resolve_cascades(grid, 0, u32::MAX, &mut seeded_rng(3));
        assert!(outcome.cascades() >= 2);
        // iteration 1 pays double the base rate
        let second = &outcome.steps[1];
        assert_eq!(
            second.score_gained,
            match_score(second.matched.len()) * 2
        );
    }

    #[test]
    fn resolve_cascades__stops_once_the_target_is_reached() {
        let mut rows = checkerboard_rows();
        rows[7] = [4, 4, 4, 0, 1, 0, 1, 0];
        let grid = grid_from_rows(6, rows);

        // base triple scores 90; target within reach on iteration 0
        let outcome = resolve_cascades(grid, 50, 100, &mut seeded_rng(4));
        assert_eq!(outcome.cascades(), 1);
        assert!(50 + outcome.score_gained >= 100);
    }

    #[test]
    fn resolve_cascades__grants_time_for_bonus_kind_runs() {
        let mut rows = checkerboard_rows();
        rows[7][0] = TIME_BONUS_KIND;
        rows[7][1] = TIME_BONUS_KIND;
        rows[7][2] = TIME_BONUS_KIND;
        rows[7][3] = TIME_BONUS_KIND;
        for x in 4..GRID_SIZE {
            rows[7][x] = ((x + 7) % 2) as u8;
        }
        let grid = grid_from_rows(8, rows);

        let outcome = resolve_cascades(grid, 0, u32::MAX, &mut seeded_rng(5));
        assert!(outcome.steps[0].bonus_secs == 20);
        assert!(outcome.bonus_secs >= 20);
    }

    #[test]
    fn resolve_cascades__leaves_no_residual_matches() {
        for seed in 0..30 {
            let mut rng = seeded_rng(seed);
            let grid = Grid::random(4, &mut rng);
            let outcome = resolve_cascades(grid, 0, u32::MAX, &mut rng);
            assert!(
                find_all_matches(&outcome.grid).is_empty(),
                "seed {seed} left matches on the board"
            );
        }
    }
}
