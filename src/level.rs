use serde::{Deserialize, Serialize};

/// Session parameters derived from a level number. Pure function of
/// the level; nothing here is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub level: u32,
    /// Distinct tile kinds in play, 4..=8. The time-bonus kind (7)
    /// only enters the draw at 8 kinds.
    pub tile_kinds: u8,
    pub moves: u32,
    /// Seconds; 0 means untimed.
    pub time_limit: u32,
    pub target_score: u32,
}

impl LevelConfig {
    pub fn is_timed(&self) -> bool {
        self.time_limit > 0
    }
}

/// Deterministic difficulty curve. Targets rise linearly, the kind
/// pool widens every four levels, the move budget tapers, and levels
/// turn timed from level 4 with a floor of 90 seconds. The exact
/// numbers are tuning, not contract; the contract is determinism and
/// monotonically rising difficulty.
pub fn level_config(level: u32) -> LevelConfig {
    let level = level.max(1);
    let tile_kinds = (4 + (level - 1) / 4).min(8) as u8;
    let moves = 30u32.saturating_sub(level / 2).max(20);
    let time_limit = if level < 4 {
        0
    } else {
        (180u32).saturating_sub((level - 4) * 5).max(90)
    };
    let target_score = 500 + 350 * level;
    LevelConfig {
        level,
        tile_kinds,
        moves,
        time_limit,
        target_score,
    }
}

/// Base score for one detection pass clearing `cleared` tiles, before
/// the cascade multiplier. Quadratic, so shaped and multi-run clears
/// beat repeated simple triples.
pub fn match_score(cleared: usize) -> u32 {
    let n = cleared as u32;
    n * n * 10
}
