use crate::grid::{GRID_SIZE, Grid, Position, TIME_BONUS_KIND};
use std::collections::BTreeSet;

/// A maximal run of 3+ equal-kind tiles along one axis.
#[derive(Clone, Debug)]
pub struct MatchRun {
    pub kind: u8,
    pub cells: Vec<Position>,
}

impl MatchRun {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Output of one detection pass: the axis runs plus the de-duplicated
/// set of positions they cover. A tile sitting at an L/T intersection
/// appears in two runs but only once in the position set.
#[derive(Clone, Debug, Default)]
pub struct Matches {
    runs: Vec<MatchRun>,
}

impl Matches {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn runs(&self) -> &[MatchRun] {
        &self.runs
    }

    /// De-duplicated positions across all runs.
    pub fn positions(&self) -> BTreeSet<Position> {
        self.runs
            .iter()
            .flat_map(|run| run.cells.iter().copied())
            .collect()
    }

    /// Countdown seconds granted by runs of the reserved time-bonus
    /// kind: 3 tiles -> 15s, 4 -> 20s, 5 -> 25s, 6+ -> 30s.
    pub fn time_bonus_secs(&self) -> u32 {
        self.runs
            .iter()
            .filter(|run| run.kind == TIME_BONUS_KIND)
            .map(|run| match run.len() {
                0..=2 => 0,
                3 => 15,
                4 => 20,
                5 => 25,
                _ => 30,
            })
            .sum()
    }
}

/// Scan each row and each column for runs of 3+ equal kinds. Tiles
/// already flagged `matched` from a previous pass are in flight to
/// removal and never join a new run. Read-only: the caller flags the
/// returned positions itself.
pub fn find_all_matches(grid: &Grid) -> Matches {
    let mut runs = Vec::new();

    for y in 0..GRID_SIZE {
        collect_runs(
            grid,
            (0..GRID_SIZE).map(|x| Position::new(x, y)),
            &mut runs,
        );
    }
    for x in 0..GRID_SIZE {
        collect_runs(
            grid,
            (0..GRID_SIZE).map(|y| Position::new(x, y)),
            &mut runs,
        );
    }

    Matches { runs }
}

fn collect_runs(
    grid: &Grid,
    line: impl Iterator<Item = Position>,
    runs: &mut Vec<MatchRun>,
) {
    let mut current: Vec<Position> = Vec::new();
    let mut current_kind = None;

    let mut flush = |cells: &mut Vec<Position>, kind: Option<u8>| {
        if cells.len() >= 3
            && let Some(kind) = kind
        {
            runs.push(MatchRun {
                kind,
                cells: std::mem::take(cells),
            });
        } else {
            cells.clear();
        }
    };

    for pos in line {
        let tile = grid.tile(pos);
        let key = (!tile.matched).then_some(tile.kind);
        if key.is_some() && key == current_kind {
            current.push(pos);
        } else {
            flush(&mut current, current_kind);
            current_kind = key;
            if key.is_some() {
                current.push(pos);
            }
        }
    }
    flush(&mut current, current_kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{checkerboard_rows, grid_from_rows};

    #[test]
    fn two_back_to_back_runs_report_all_seven_positions() {
        // row 2: A A A B B B B over a quiet background
        let mut rows = checkerboard_rows();
        rows[2] = [4, 4, 4, 5, 5, 5, 5, 0];
        rows[2][7] = rows[1][7] ^ 1; // keep column 7 quiet
        let grid = grid_from_rows(6, rows);

        let matches = find_all_matches(&grid);
        let positions = matches.positions();
        assert_eq!(positions.len(), 7);
        assert_eq!(matches.runs().len(), 2);
        for x in 0..7 {
            assert!(positions.contains(&Position::new(x, 2)));
        }
    }

    #[test]
    fn l_shape_intersection_is_deduplicated_to_five() {
        let mut rows = checkerboard_rows();
        // horizontal 3-run at row 0, vertical 3-run down column 0,
        // sharing the corner tile at (0, 0)
        rows[0][0] = 4;
        rows[0][1] = 4;
        rows[0][2] = 4;
        rows[1][0] = 4;
        rows[2][0] = 4;
        let grid = grid_from_rows(6, rows);

        let matches = find_all_matches(&grid);
        assert_eq!(matches.positions().len(), 5);
    }

    #[test]
    fn quiet_board_reports_no_matches() {
        let grid = grid_from_rows(6, checkerboard_rows());
        assert!(find_all_matches(&grid).is_empty());
    }

    #[test]
    fn already_flagged_tiles_are_excluded() {
        let mut rows = checkerboard_rows();
        rows[3] = [2, 2, 2, 0, 1, 0, 1, 0];
        let grid = grid_from_rows(6, rows);
        let first = find_all_matches(&grid).positions();
        assert_eq!(first.len(), 3);

        let flagged = grid.with_matched(first);
        assert!(find_all_matches(&flagged).is_empty());
    }

    #[test]
    fn time_bonus_scales_with_run_length() {
        for (len, secs) in [(3usize, 15u32), (4, 20), (5, 25), (6, 30), (7, 30)] {
            let mut rows = checkerboard_rows();
            for x in 0..len {
                rows[4][x] = TIME_BONUS_KIND;
            }
            if len < GRID_SIZE {
                // keep the cell after the run from extending it
                rows[4][len] = 0;
            }
            let grid = grid_from_rows(8, rows);
            let matches = find_all_matches(&grid);
            assert_eq!(matches.time_bonus_secs(), secs, "run length {len}");
        }
    }

    #[test]
    fn non_bonus_runs_grant_no_time() {
        let mut rows = checkerboard_rows();
        rows[5] = [3, 3, 3, 3, 0, 1, 0, 1];
        let grid = grid_from_rows(6, rows);
        assert_eq!(find_all_matches(&grid).time_bonus_secs(), 0);
    }
}
