//! Terminal client: owns the cursor, the live session, and the
//! collaborator seams, and turns session events into status lines and
//! cascade replay frames. Everything except `run_app`/`run_loop` is
//! terminal-free so tests drive the controller directly.

use crate::cascade::CascadeStep;
use crate::grid::{GRID_SIZE, Grid, Position};
use crate::ledger::{
    GameRecord, JsonStats, LocalLedger, RewardLedger, StatsService,
};
use crate::session::{
    BoosterKind, Boosters, GameSession, Outcome, Phase, SessionEvent,
};
use crate::ui::{self, UiState, UserEvent};
use chrono::Utc;
use color_eyre::eyre::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

/// Every session starts with the same complimentary inventory; the
/// shop only arms what is already owned.
pub const STARTING_BOOSTERS: Boosters = Boosters {
    hammer: 2,
    color_bomb: 1,
    shuffle: 2,
};

const HIGHLIGHT_FRAME: Duration = Duration::from_millis(140);
const SETTLE_FRAME: Duration = Duration::from_millis(90);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub player: String,
    /// Starting level; defaults to one past the player's last game.
    pub level: Option<u32>,
    pub data_dir: PathBuf,
    /// Fixed board seed, for reproducing a game.
    pub seed: Option<u64>,
}

/// One cell as the UI draws it.
#[derive(Clone, Copy, Debug)]
pub struct CellView {
    pub kind: u8,
    pub id: u64,
    pub cursor: bool,
    pub selected: bool,
    pub matched: bool,
    pub falling: bool,
}

/// Immutable view handed to the draw layer.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub player: String,
    pub level: u32,
    pub score: u32,
    pub target_score: u32,
    pub moves_left: u32,
    pub time_left: Option<u32>,
    pub boosters: Boosters,
    pub cells: Vec<Vec<CellView>>,
    pub playing: bool,
    pub armed: Option<BoosterKind>,
    pub reward_on_win: u64,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController<L, S> {
    player: String,
    level: u32,
    seed: Option<u64>,
    ledger: L,
    stats: S,
    session: Option<GameSession>,
    cursor: Position,
    status: String,
    errors: Vec<String>,
}

impl AppController<LocalLedger, JsonStats> {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let ledger = LocalLedger::open(&config.data_dir)?;
        let stats = JsonStats::open(&config.data_dir)?;
        let level = match config.level {
            Some(level) => level,
            None => match stats.last_level(&config.player).await {
                Ok(last) => last.map(|l| l + 1).unwrap_or(1),
                Err(error) => {
                    warn!(%error, "failed to read stats, starting at level 1");
                    1
                }
            },
        };
        Ok(AppController::new(
            config.player.clone(),
            level,
            config.seed,
            ledger,
            stats,
        ))
    }
}

impl<L: RewardLedger, S: StatsService> AppController<L, S> {
    pub fn new(
        player: String,
        level: u32,
        seed: Option<u64>,
        ledger: L,
        stats: S,
    ) -> Self {
        AppController {
            player,
            level,
            seed,
            ledger,
            stats,
            session: None,
            cursor: Position::new(GRID_SIZE / 2, GRID_SIZE / 2),
            status: String::from("Press n to start"),
            errors: Vec::new(),
        }
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.errors.clear();
    }

    fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Ask the ledger for permission, then deal a fresh board. A
    /// refused or failed request leaves no session; the player can
    /// retry.
    pub async fn start_game(&mut self) -> Vec<CascadeStep> {
        if let Some(session) = &self.session
            && session.is_playing()
        {
            self.set_status("Finish this game first");
            return Vec::new();
        }
        match self.ledger.begin_session(&self.player, self.level).await {
            Ok(ticket) => {
                let session =
                    GameSession::new(self.level, STARTING_BOOSTERS, self.seed);
                let summary = level_summary(&session);
                self.session = Some(session);
                let play = if ticket.free_play { "free play" } else { "paid" };
                info!(player = %self.player, level = self.level, play, "game started");
                self.set_status(summary);
            }
            Err(error) => {
                warn!(%error, "ledger refused session");
                self.push_error(format!("Could not start game: {error:#}"));
            }
        }
        Vec::new()
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) {
        let max = (GRID_SIZE - 1) as i32;
        let x = (self.cursor.x as i32 + dx).clamp(0, max);
        let y = (self.cursor.y as i32 + dy).clamp(0, max);
        self.cursor = Position::new(x as usize, y as usize);
    }

    pub async fn press(&mut self) -> Vec<CascadeStep> {
        let cursor = self.cursor;
        let events = match &mut self.session {
            Some(session) => session.press(cursor),
            None => return Vec::new(),
        };
        self.apply_events(events).await
    }

    pub async fn arm_booster(&mut self, kind: BoosterKind) -> Vec<CascadeStep> {
        let events = match &mut self.session {
            Some(session) => session.arm_booster(kind),
            None => return Vec::new(),
        };
        self.apply_events(events).await
    }

    pub async fn cancel_action(&mut self) -> Vec<CascadeStep> {
        let events = match &mut self.session {
            Some(session) => session.cancel_booster(),
            None => return Vec::new(),
        };
        self.apply_events(events).await
    }

    pub async fn tick(&mut self) -> Vec<CascadeStep> {
        let events = match &mut self.session {
            Some(session) => session.tick(),
            None => return Vec::new(),
        };
        self.apply_events(events).await
    }

    pub fn set_paused(&mut self, paused: bool) {
        if let Some(session) = &mut self.session {
            session.set_paused(paused);
        }
    }

    /// Turn session events into status lines, collect replay frames,
    /// and report finished games to the collaborators.
    async fn apply_events(
        &mut self,
        events: Vec<SessionEvent>,
    ) -> Vec<CascadeStep> {
        let mut steps = Vec::new();
        for event in events {
            match event {
                SessionEvent::Selected(_) | SessionEvent::Deselected => {}
                SessionEvent::SwapRejected { .. } => {
                    self.set_status("No match there; swap reverted");
                }
                SessionEvent::Resolved(outcome) => {
                    if outcome.score_gained > 0 {
                        let cascades = outcome.cascades();
                        let mut line =
                            format!("+{} points", outcome.score_gained);
                        if cascades > 1 {
                            line.push_str(&format!(" (x{cascades} cascade)"));
                        }
                        if outcome.bonus_secs > 0 {
                            line.push_str(&format!(
                                ", +{}s on the clock",
                                outcome.bonus_secs
                            ));
                        }
                        self.set_status(line);
                    }
                    steps.extend(outcome.steps);
                }
                SessionEvent::Reshuffled => {
                    self.set_status("No moves left on the board; reshuffled");
                }
                SessionEvent::BoosterArmed(kind) => {
                    self.set_status(format!(
                        "{} armed; pick a target",
                        ui::booster_name(kind)
                    ));
                }
                SessionEvent::BoosterCancelled => {
                    self.set_status("Booster disarmed");
                }
                SessionEvent::BoosterUnavailable(kind) => {
                    self.set_status(format!(
                        "No {} left",
                        ui::booster_name(kind).to_lowercase()
                    ));
                }
                SessionEvent::BoosterSpent(_) => {}
                SessionEvent::Won { score } => {
                    self.report_won(score).await;
                }
                SessionEvent::Lost(outcome) => {
                    self.report_lost(outcome).await;
                }
            }
        }
        steps
    }

    async fn report_won(&mut self, score: u32) {
        let level = self.level;
        let reward = self.ledger.reward_for_level(level);
        if let Err(error) =
            self.ledger.report_win(&self.player, level, reward).await
        {
            warn!(%error, "failed to credit win");
            self.push_error(format!("Win not credited: {error:#}"));
        }
        self.record_game(level, score, true).await;
        self.level = level + 1;
        self.set_status(format!(
            "Level {level} cleared! {reward} JOY credited. Press n for level {}",
            self.level
        ));
    }

    async fn report_lost(&mut self, outcome: Outcome) {
        let level = self.level;
        let score = self.session.as_ref().map(|s| s.score()).unwrap_or(0);
        self.record_game(level, score, false).await;
        let reason = match outcome {
            Outcome::OutOfMoves => "Out of moves",
            Outcome::OutOfTime => "Out of time",
            Outcome::Won => unreachable!("wins are reported as Won"),
        };
        self.set_status(format!("{reason}. Press n to retry level {level}"));
    }

    // Best-effort: a stats failure never interrupts play.
    async fn record_game(&mut self, level: u32, score: u32, won: bool) {
        let record = GameRecord {
            player: self.player.clone(),
            level,
            score,
            won,
            finished_at: Utc::now(),
        };
        if let Err(error) = self.stats.record_game(&record).await {
            warn!(%error, "failed to record game");
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let grid = self.session.as_ref().map(|s| s.grid());
        self.snapshot_of(grid)
    }

    /// Snapshot with a replay frame standing in for the live grid.
    pub fn snapshot_with_grid(&self, grid: &Grid) -> AppSnapshot {
        self.snapshot_of(Some(grid))
    }

    fn snapshot_of(&self, grid: Option<&Grid>) -> AppSnapshot {
        let session = self.session.as_ref();
        let (selected, armed) = match session.map(|s| s.phase()) {
            Some(Phase::TileSelected(pos)) => (Some(pos), None),
            Some(Phase::BoosterArmed(kind)) => (None, Some(kind)),
            _ => (None, None),
        };
        let cells = (0..GRID_SIZE)
            .map(|y| {
                (0..GRID_SIZE)
                    .map(|x| {
                        let pos = Position::new(x, y);
                        match grid {
                            Some(grid) => {
                                let tile = grid.tile(pos);
                                CellView {
                                    kind: tile.kind,
                                    id: tile.id,
                                    cursor: pos == self.cursor,
                                    selected: selected == Some(pos),
                                    matched: tile.matched,
                                    falling: tile.falling,
                                }
                            }
                            None => CellView {
                                kind: 0,
                                id: 0,
                                cursor: false,
                                selected: false,
                                matched: false,
                                falling: false,
                            },
                        }
                    })
                    .collect()
            })
            .collect();
        AppSnapshot {
            player: self.player.clone(),
            level: self.level,
            score: session.map(|s| s.score()).unwrap_or(0),
            target_score: session
                .map(|s| s.config().target_score)
                .unwrap_or_else(|| {
                    crate::level::level_config(self.level).target_score
                }),
            moves_left: session.map(|s| s.moves_left()).unwrap_or(0),
            time_left: session
                .and_then(|s| s.config().is_timed().then(|| s.time_left())),
            boosters: session.map(|s| s.boosters()).unwrap_or_default(),
            cells,
            playing: session.map(|s| s.is_playing()).unwrap_or(false),
            armed,
            reward_on_win: self.ledger.reward_for_level(self.level),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }
}

fn level_summary(session: &GameSession) -> String {
    let config = session.config();
    let clock = if config.is_timed() {
        format!(", {}s", config.time_limit)
    } else {
        String::new()
    };
    format!(
        "Level {}: score {} in {} moves{clock}",
        config.level, config.target_score, config.moves
    )
}

pub async fn run_app(config: &AppConfig) -> Result<()> {
    let mut controller = AppController::from_config(config).await?;
    let mut ui_state = UiState::default();
    ui::terminal_enter(&mut ui_state)?;
    let result = run_loop(&mut controller, &mut ui_state).await;
    ui::terminal_exit()?;
    result
}

async fn run_loop<L: RewardLedger, S: StatsService>(
    controller: &mut AppController<L, S>,
    ui_state: &mut UiState,
) -> Result<()> {
    let mut input = ui::input_event_stream();
    let mut ticker = time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    controller.start_game().await;
    ui::draw(ui_state, &controller.snapshot())?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let steps = controller.tick().await;
                replay(controller, ui_state, steps).await?;
                ui::draw(ui_state, &controller.snapshot())?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            maybe_raw = ui::next_raw_event(&mut input) => {
                let Some(raw) = maybe_raw else { break };
                let Some(event) = ui::interpret_event(ui_state, raw) else {
                    continue;
                };
                let steps = match event {
                    UserEvent::Quit => break,
                    UserEvent::Redraw => Vec::new(),
                    UserEvent::CursorMove { dx, dy } => {
                        controller.move_cursor(dx, dy);
                        Vec::new()
                    }
                    UserEvent::Press => controller.press().await,
                    UserEvent::CancelAction => {
                        controller.cancel_action().await
                    }
                    UserEvent::ArmBooster(kind) => {
                        controller.arm_booster(kind).await
                    }
                    UserEvent::NewGame => controller.start_game().await,
                    UserEvent::OpenShop => {
                        controller.set_paused(true);
                        Vec::new()
                    }
                    UserEvent::CloseShop => {
                        controller.set_paused(false);
                        Vec::new()
                    }
                    UserEvent::ConfirmShopArm(kind) => {
                        controller.set_paused(false);
                        controller.arm_booster(kind).await
                    }
                };
                replay(controller, ui_state, steps).await?;
                ui::draw(ui_state, &controller.snapshot())?;
            }
        }
    }
    Ok(())
}

/// Play the cascade frames back at a readable pace: highlight the
/// matched tiles, then show the settled board, per iteration.
async fn replay<L: RewardLedger, S: StatsService>(
    controller: &AppController<L, S>,
    ui_state: &mut UiState,
    steps: Vec<CascadeStep>,
) -> Result<()> {
    for step in steps {
        ui::draw(ui_state, &controller.snapshot_with_grid(&step.highlight))?;
        time::sleep(HIGHLIGHT_FRAME).await;
        ui::draw(ui_state, &controller.snapshot_with_grid(&step.settled))?;
        time::sleep(SETTLE_FRAME).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::ledger::SessionTicket;
    use color_eyre::eyre::eyre;

    #[derive(Default)]
    struct FakeLedger {
        refuse: bool,
        wins: Vec<(String, u32, u64)>,
    }

    impl RewardLedger for FakeLedger {
        async fn begin_session(
            &mut self,
            player: &str,
            _level: u32,
        ) -> Result<SessionTicket> {
            if self.refuse {
                return Err(eyre!("no free plays left for {player}"));
            }
            Ok(SessionTicket { free_play: true })
        }

        fn reward_for_level(&self, level: u32) -> u64 {
            75 + 25 * level as u64
        }

        async fn report_win(
            &mut self,
            player: &str,
            level: u32,
            reward: u64,
        ) -> Result<()> {
            self.wins.push((player.to_string(), level, reward));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStats {
        records: Vec<GameRecord>,
    }

    impl StatsService for FakeStats {
        async fn record_game(&mut self, record: &GameRecord) -> Result<()> {
            self.records.push(record.clone());
            Ok(())
        }

        async fn last_level(&self, player: &str) -> Result<Option<u32>> {
            Ok(self
                .records
                .iter()
                .filter(|r| r.player == player)
                .max_by_key(|r| r.finished_at)
                .map(|r| r.level))
        }
    }

    fn controller() -> AppController<FakeLedger, FakeStats> {
        AppController::new(
            "alice".into(),
            1,
            Some(7),
            FakeLedger::default(),
            FakeStats::default(),
        )
    }

    #[tokio::test]
    async fn start_game__deals_a_session_on_ledger_approval() {
        let mut controller = controller();
        controller.start_game().await;
        let session = controller.session().unwrap();
        assert!(session.is_playing());
        assert_eq!(session.boosters(), STARTING_BOOSTERS);
        assert!(controller.errors().is_empty());
    }

    #[tokio::test]
    async fn start_game__ledger_refusal_is_surfaced_and_retryable() {
        let mut controller = controller();
        controller.ledger.refuse = true;
        controller.start_game().await;
        assert!(controller.session().is_none());
        assert_eq!(controller.errors().len(), 1);

        // the ledger recovers; the next attempt succeeds
        controller.ledger.refuse = false;
        controller.start_game().await;
        assert!(controller.session().is_some());
        assert!(controller.errors().is_empty());
    }

    #[tokio::test]
    async fn move_cursor__clamps_to_the_board() {
        let mut controller = controller();
        for _ in 0..20 {
            controller.move_cursor(-1, -1);
        }
        assert_eq!(controller.cursor, Position::new(0, 0));
        for _ in 0..20 {
            controller.move_cursor(1, 0);
        }
        assert_eq!(controller.cursor, Position::new(GRID_SIZE - 1, 0));
    }

    #[tokio::test]
    async fn press__selects_the_tile_under_the_cursor() {
        let mut controller = controller();
        controller.start_game().await;
        controller.press().await;
        assert_eq!(
            controller.session().unwrap().phase(),
            Phase::TileSelected(controller.cursor)
        );
    }

    #[tokio::test]
    async fn won_game_credits_reward_and_advances_the_level() {
        let mut controller = controller();
        controller.start_game().await;
        let score = 1234;
        controller
            .apply_events(vec![SessionEvent::Won { score }])
            .await;

        assert_eq!(controller.level(), 2);
        assert_eq!(controller.ledger.wins, vec![("alice".into(), 1, 100)]);
        let record = &controller.stats.records[0];
        assert!(record.won);
        assert_eq!(record.score, score);
        assert_eq!(record.level, 1);
    }

    #[tokio::test]
    async fn lost_game_records_stats_and_keeps_the_level() {
        let mut controller = controller();
        controller.start_game().await;
        controller
            .apply_events(vec![SessionEvent::Lost(Outcome::OutOfMoves)])
            .await;

        assert_eq!(controller.level(), 1);
        assert!(controller.ledger.wins.is_empty());
        assert!(!controller.stats.records[0].won);
    }

    #[tokio::test]
    async fn snapshot__reflects_session_state() {
        let mut controller = controller();
        let empty = controller.snapshot();
        assert!(!empty.playing);

        controller.start_game().await;
        let snap = controller.snapshot();
        assert!(snap.playing);
        assert_eq!(snap.cells.len(), GRID_SIZE);
        assert_eq!(snap.cells[0].len(), GRID_SIZE);
        assert_eq!(snap.reward_on_win, 100);
        let cursors =
            snap.cells.iter().flatten().filter(|c| c.cursor).count();
        assert_eq!(cursors, 1);
    }
}
