use crate::cascade::{CascadeOutcome, resolve_cascades};
use crate::gravity::apply_gravity;
use crate::grid::{Grid, Position};
use crate::level::{LevelConfig, level_config};
use crate::moves::{can_swap, has_valid_moves, swap_tiles};
use crate::matches::find_all_matches;
use crate::shuffle::shuffle_grid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoosterKind {
    Hammer,
    ColorBomb,
    Shuffle,
}

/// Consumable inventory for one session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Boosters {
    pub hammer: u32,
    pub color_bomb: u32,
    pub shuffle: u32,
}

impl Boosters {
    pub fn count(&self, kind: BoosterKind) -> u32 {
        match kind {
            BoosterKind::Hammer => self.hammer,
            BoosterKind::ColorBomb => self.color_bomb,
            BoosterKind::Shuffle => self.shuffle,
        }
    }

    fn spend(&mut self, kind: BoosterKind) -> bool {
        let slot = match kind {
            BoosterKind::Hammer => &mut self.hammer,
            BoosterKind::ColorBomb => &mut self.color_bomb,
            BoosterKind::Shuffle => &mut self.shuffle,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }
}

/// Why a finished session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Won,
    OutOfMoves,
    OutOfTime,
}

/// Explicit interaction state. Replaces the nullable
/// selected-tile-plus-armed-booster pairing with states that cannot
/// overlap: a tile cannot be "selected" while a booster is armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    TileSelected(Position),
    BoosterArmed(BoosterKind),
    Resolving,
    GameOver(Outcome),
}

/// What happened in response to one player action or tick; the client
/// turns these into status lines and replay animation.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Selected(Position),
    Deselected,
    SwapRejected { a: Position, b: Position },
    Resolved(CascadeOutcome),
    Reshuffled,
    BoosterArmed(BoosterKind),
    BoosterCancelled,
    BoosterUnavailable(BoosterKind),
    BoosterSpent(BoosterKind),
    Won { score: u32 },
    Lost(Outcome),
}

/// One play of one level: the session owns the authoritative grid,
/// score, budgets, and phase. All grid transforms go through the pure
/// engine functions; the session serializes them, so there is never
/// more than one resolution in flight.
pub struct GameSession {
    config: LevelConfig,
    grid: Grid,
    score: u32,
    moves_left: u32,
    time_left: u32,
    boosters: Boosters,
    phase: Phase,
    paused: bool,
    rng: StdRng,
}

impl GameSession {
    /// Start a session for `level`. Pass a seed for a reproducible
    /// board (tests, replays); `None` seeds from the OS.
    pub fn new(level: u32, boosters: Boosters, seed: Option<u64>) -> Self {
        let config = level_config(level);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        // Starting boards are match-free: no free cascades.
        let mut grid = Grid::settled_random(config.tile_kinds, &mut rng);
        if !has_valid_moves(&grid) {
            grid = shuffle_grid(&grid, &mut rng);
        }
        info!(
            level,
            target = config.target_score,
            moves = config.moves,
            time = config.time_limit,
            "session started"
        );
        GameSession {
            config,
            grid,
            score: 0,
            moves_left: config.moves,
            time_left: config.time_limit,
            boosters,
            phase: Phase::Idle,
            paused: false,
            rng,
        }
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn moves_left(&self) -> u32 {
        self.moves_left
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn boosters(&self) -> Boosters {
        self.boosters
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        !matches!(self.phase, Phase::GameOver(_))
    }

    /// Pause/resume the countdown (booster shop overlay open).
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Handle a tile press. Meaning depends on the phase: selection,
    /// swap attempt, or booster target.
    pub fn press(&mut self, pos: Position) -> Vec<SessionEvent> {
        match self.phase {
            Phase::GameOver(_) | Phase::Resolving => Vec::new(),
            Phase::BoosterArmed(BoosterKind::Hammer) => self.fire_hammer(pos),
            Phase::BoosterArmed(BoosterKind::ColorBomb) => {
                self.fire_color_bomb(pos)
            }
            Phase::BoosterArmed(BoosterKind::Shuffle) => Vec::new(),
            Phase::Idle => {
                self.phase = Phase::TileSelected(pos);
                vec![SessionEvent::Selected(pos)]
            }
            Phase::TileSelected(prev) if prev == pos => {
                self.phase = Phase::Idle;
                vec![SessionEvent::Deselected]
            }
            Phase::TileSelected(prev) if can_swap(prev, pos) => {
                self.try_swap(prev, pos)
            }
            Phase::TileSelected(_) => {
                // non-adjacent press moves the selection
                self.phase = Phase::TileSelected(pos);
                vec![SessionEvent::Selected(pos)]
            }
        }
    }

    /// One second of countdown. No-op while untimed, paused, or over.
    /// Win is never decided here; reaching the target already ended the
    /// session during resolution, so an expiring clock is a loss.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        if !self.is_playing() || self.paused || !self.config.is_timed() {
            return Vec::new();
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.phase = Phase::GameOver(Outcome::OutOfTime);
            info!(score = self.score, "session lost on time");
            return vec![SessionEvent::Lost(Outcome::OutOfTime)];
        }
        Vec::new()
    }

    /// Arm (or immediately apply, for Shuffle) a booster. Hammer and
    /// color bomb wait for a target press; arming clears any tile
    /// selection.
    pub fn arm_booster(&mut self, kind: BoosterKind) -> Vec<SessionEvent> {
        if !self.is_playing() || matches!(self.phase, Phase::Resolving) {
            return Vec::new();
        }
        if self.boosters.count(kind) == 0 {
            return vec![SessionEvent::BoosterUnavailable(kind)];
        }
        match kind {
            BoosterKind::Shuffle => self.fire_shuffle(),
            BoosterKind::Hammer | BoosterKind::ColorBomb => {
                self.phase = Phase::BoosterArmed(kind);
                vec![SessionEvent::BoosterArmed(kind)]
            }
        }
    }

    /// Disarm a pending hammer/color bomb without spending it.
    pub fn cancel_booster(&mut self) -> Vec<SessionEvent> {
        if matches!(self.phase, Phase::BoosterArmed(_)) {
            self.phase = Phase::Idle;
            vec![SessionEvent::BoosterCancelled]
        } else {
            Vec::new()
        }
    }

    fn try_swap(&mut self, a: Position, b: Position) -> Vec<SessionEvent> {
        let speculative = swap_tiles(&self.grid, a, b);
        if find_all_matches(&speculative).is_empty() {
            // unproductive: revert silently, no move consumed
            debug!(?a, ?b, "swap rejected");
            self.phase = Phase::Idle;
            return vec![SessionEvent::SwapRejected { a, b }];
        }
        self.moves_left -= 1;
        self.resolve_on(speculative, true)
    }

    fn fire_hammer(&mut self, target: Position) -> Vec<SessionEvent> {
        if !self.boosters.spend(BoosterKind::Hammer) {
            self.phase = Phase::Idle;
            return vec![SessionEvent::BoosterUnavailable(BoosterKind::Hammer)];
        }
        let flagged = self.grid.with_matched([target]);
        let settled = apply_gravity(&flagged, &mut self.rng);
        let mut events = vec![SessionEvent::BoosterSpent(BoosterKind::Hammer)];
        events.extend(self.resolve_on(settled, false));
        events
    }

    fn fire_color_bomb(&mut self, target: Position) -> Vec<SessionEvent> {
        if !self.boosters.spend(BoosterKind::ColorBomb) {
            self.phase = Phase::Idle;
            return vec![SessionEvent::BoosterUnavailable(
                BoosterKind::ColorBomb,
            )];
        }
        let kind = self.grid.kind_at(target);
        let flagged = self.grid.with_matched(self.grid.positions_of_kind(kind));
        let settled = apply_gravity(&flagged, &mut self.rng);
        let mut events =
            vec![SessionEvent::BoosterSpent(BoosterKind::ColorBomb)];
        events.extend(self.resolve_on(settled, false));
        events
    }

    fn fire_shuffle(&mut self) -> Vec<SessionEvent> {
        // inventory already checked by arm_booster
        self.boosters.spend(BoosterKind::Shuffle);
        self.grid = shuffle_grid(&self.grid, &mut self.rng);
        self.phase = Phase::Idle;
        vec![
            SessionEvent::BoosterSpent(BoosterKind::Shuffle),
            SessionEvent::Reshuffled,
        ]
    }

    /// Run the cascade resolver on a committed grid, then settle the
    /// session: win check first, deadlock reshuffle, loss check. Win
    /// is checked before loss so reaching the target on the final move
    /// wins.
    fn resolve_on(
        &mut self,
        grid: Grid,
        move_consumed: bool,
    ) -> Vec<SessionEvent> {
        self.phase = Phase::Resolving;
        let outcome = resolve_cascades(
            grid,
            self.score,
            self.config.target_score,
            &mut self.rng,
        );
        self.score += outcome.score_gained;
        if self.config.is_timed() && outcome.bonus_secs > 0 {
            self.time_left += outcome.bonus_secs;
        }
        self.grid = outcome.grid.clone();

        let mut events = vec![SessionEvent::Resolved(outcome)];

        if self.score >= self.config.target_score {
            self.phase = Phase::GameOver(Outcome::Won);
            info!(score = self.score, "session won");
            events.push(SessionEvent::Won { score: self.score });
            return events;
        }

        if !has_valid_moves(&self.grid) {
            self.grid = shuffle_grid(&self.grid, &mut self.rng);
            events.push(SessionEvent::Reshuffled);
        }

        if move_consumed && self.moves_left == 0 {
            self.phase = Phase::GameOver(Outcome::OutOfMoves);
            info!(score = self.score, "session lost out of moves");
            events.push(SessionEvent::Lost(Outcome::OutOfMoves));
            return events;
        }

        self.phase = Phase::Idle;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GRID_SIZE;
    use crate::test_helpers::{checkerboard_rows, grid_from_rows};

    fn session_with_grid(
        level: u32,
        boosters: Boosters,
        rows: [[u8; GRID_SIZE]; GRID_SIZE],
        kinds: u8,
    ) -> GameSession {
        let mut session = GameSession::new(level, boosters, Some(42));
        session.grid = grid_from_rows(kinds, rows);
        session
    }

    fn swap_ready_rows() -> [[u8; GRID_SIZE]; GRID_SIZE] {
        // swapping (2,2) and (3,2) completes 4 4 4 on row 2
        let mut rows = checkerboard_rows();
        rows[2][0] = 4;
        rows[2][1] = 4;
        rows[2][3] = 4;
        rows
    }

    #[test]
    fn press__selects_then_deselects_the_same_tile() {
        let mut session =
            session_with_grid(1, Boosters::default(), checkerboard_rows(), 6);
        let pos = Position::new(3, 3);
        session.press(pos);
        assert_eq!(session.phase(), Phase::TileSelected(pos));
        session.press(pos);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn press__rejected_swap_keeps_grid_moves_and_score() {
        let mut session =
            session_with_grid(1, Boosters::default(), swap_ready_rows(), 6);
        let before_moves = session.moves_left();
        let a = Position::new(5, 5);
        let b = Position::new(6, 5);
        let tile_a = session.grid().tile(a);

        session.press(a);
        let events = session.press(b);

        assert!(matches!(
            events.as_slice(),
            [SessionEvent::SwapRejected { .. }]
        ));
        assert_eq!(session.moves_left(), before_moves);
        assert_eq!(session.score(), 0);
        assert_eq!(session.grid().tile(a), tile_a);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn press__productive_swap_consumes_one_move_and_scores() {
        let mut session =
            session_with_grid(1, Boosters::default(), swap_ready_rows(), 6);
        let before_moves = session.moves_left();

        session.press(Position::new(2, 2));
        let events = session.press(Position::new(3, 2));

        assert_eq!(session.moves_left(), before_moves - 1);
        assert!(session.score() >= crate::level::match_score(3));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Resolved(_))));
    }

    #[test]
    fn press__win_on_final_move_beats_out_of_moves() {
        let mut session =
            session_with_grid(1, Boosters::default(), swap_ready_rows(), 6);
        session.moves_left = 1;
        // one base triple away from the target
        session.score = session.config.target_score - 1;

        session.press(Position::new(2, 2));
        let events = session.press(Position::new(3, 2));

        assert_eq!(session.phase(), Phase::GameOver(Outcome::Won));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Won { .. })));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::Lost(_))));
        assert_eq!(session.moves_left(), 0);
    }

    #[test]
    fn tick__is_inert_while_paused_or_untimed() {
        // level 1 is untimed
        let mut session = GameSession::new(1, Boosters::default(), Some(1));
        assert!(session.tick().is_empty());
        assert_eq!(session.time_left(), 0);

        // timed level, paused
        let mut session = GameSession::new(5, Boosters::default(), Some(1));
        let before = session.time_left();
        session.set_paused(true);
        assert!(session.tick().is_empty());
        assert_eq!(session.time_left(), before);
        session.set_paused(false);
        session.tick();
        assert_eq!(session.time_left(), before - 1);
    }

    #[test]
    fn tick__expiring_clock_loses_the_session() {
        let mut session = GameSession::new(5, Boosters::default(), Some(1));
        session.time_left = 1;
        let events = session.tick();
        assert_eq!(session.phase(), Phase::GameOver(Outcome::OutOfTime));
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Lost(Outcome::OutOfTime)]
        ));
        // further input is ignored
        assert!(session.press(Position::new(0, 0)).is_empty());
    }

    #[test]
    fn arm_booster__refuses_an_empty_inventory() {
        let mut session = GameSession::new(1, Boosters::default(), Some(1));
        let events = session.arm_booster(BoosterKind::Hammer);
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::BoosterUnavailable(BoosterKind::Hammer)]
        ));
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn arm_booster__hammer_waits_for_a_target_then_fires() {
        let boosters = Boosters {
            hammer: 1,
            ..Boosters::default()
        };
        let mut session =
            session_with_grid(1, boosters, checkerboard_rows(), 6);
        session.arm_booster(BoosterKind::Hammer);
        assert_eq!(
            session.phase(),
            Phase::BoosterArmed(BoosterKind::Hammer)
        );

        let target = Position::new(4, 4);
        let doomed_id = session.grid().tile(target).id;
        let events = session.press(target);

        assert_eq!(session.boosters().hammer, 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::BoosterSpent(BoosterKind::Hammer))));
        // the destroyed tile's id is gone from the board
        let survivors: Vec<u64> = Grid::positions()
            .map(|p| session.grid().tile(p).id)
            .collect();
        assert!(!survivors.contains(&doomed_id));
    }

    #[test]
    fn arm_booster__shuffle_applies_immediately_without_scoring() {
        let boosters = Boosters {
            shuffle: 1,
            ..Boosters::default()
        };
        let mut session =
            session_with_grid(1, boosters, checkerboard_rows(), 6);
        let moves_before = session.moves_left();

        let events = session.arm_booster(BoosterKind::Shuffle);

        assert!(events.iter().any(|e| matches!(e, SessionEvent::Reshuffled)));
        assert_eq!(session.boosters().shuffle, 0);
        assert_eq!(session.score(), 0);
        assert_eq!(session.moves_left(), moves_before);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn cancel_booster__disarms_without_spending() {
        let boosters = Boosters {
            color_bomb: 1,
            ..Boosters::default()
        };
        let mut session = GameSession::new(1, boosters, Some(1));
        session.arm_booster(BoosterKind::ColorBomb);
        let events = session.cancel_booster();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::BoosterCancelled]
        ));
        assert_eq!(session.boosters().color_bomb, 1);
        assert_eq!(session.phase(), Phase::Idle);
    }
}
