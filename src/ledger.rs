use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const REWARDS_FILE: &str = "rewards.json";
const CLAIMS_FILE: &str = "claims.json";
const STATS_FILE: &str = "stats.json";

/// Granted by the reward ledger when a play is approved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTicket {
    pub free_play: bool,
}

/// One finished game, as reported to the stats service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRecord {
    pub player: String,
    pub level: u32,
    pub score: u32,
    pub won: bool,
    pub finished_at: DateTime<Utc>,
}

/// A credited win awaiting claim, as recorded by the ledger.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub player: String,
    pub level: u32,
    pub reward: u64,
    pub credited_at: DateTime<Utc>,
}

/// The component of record for play permission and reward credits.
/// The real thing lives on-chain; the engine only ever talks to this
/// seam.
pub trait RewardLedger {
    /// Ask permission to play `level`. The ledger is the sole source
    /// of truth for free plays. Failure leaves the session not
    /// started and is always retryable.
    async fn begin_session(
        &mut self,
        player: &str,
        level: u32,
    ) -> Result<SessionTicket>;

    /// Reward amount for a level, from the ledger's opaque
    /// level -> amount table.
    fn reward_for_level(&self, level: u32) -> u64;

    /// Credit a win for later claim. Called once per won game.
    async fn report_win(
        &mut self,
        player: &str,
        level: u32,
        reward: u64,
    ) -> Result<()>;
}

/// Leaderboard/profile persistence. Best-effort by contract: callers
/// log failures and keep playing.
pub trait StatsService {
    async fn record_game(&mut self, record: &GameRecord) -> Result<()>;

    /// Most recently finished level for a player, if any.
    async fn last_level(&self, player: &str) -> Result<Option<u32>>;
}

/// File-backed ledger under the data dir: reward table read from
/// `rewards.json` (falling back to a default curve), win credits
/// appended to `claims.json`.
pub struct LocalLedger {
    dir: PathBuf,
    rewards: BTreeMap<u32, u64>,
    /// Free plays remaining before (notional) fees would apply.
    free_plays: u32,
}

impl LocalLedger {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).wrap_err_with(|| {
            format!("failed to create data dir {}", dir.display())
        })?;
        let rewards_path = dir.join(REWARDS_FILE);
        let rewards = if rewards_path.exists() {
            let raw = fs::read_to_string(&rewards_path).wrap_err_with(|| {
                format!("failed to read {}", rewards_path.display())
            })?;
            serde_json::from_str(&raw).wrap_err_with(|| {
                format!("malformed reward table {}", rewards_path.display())
            })?
        } else {
            default_reward_table()
        };
        Ok(LocalLedger {
            dir,
            rewards,
            free_plays: u32::MAX,
        })
    }

    fn claims_path(&self) -> PathBuf {
        self.dir.join(CLAIMS_FILE)
    }
}

/// 100 tokens for level 1, +25 per level after that.
fn default_reward_table() -> BTreeMap<u32, u64> {
    (1..=100).map(|level| (level, 75 + 25 * level as u64)).collect()
}

impl RewardLedger for LocalLedger {
    async fn begin_session(
        &mut self,
        player: &str,
        level: u32,
    ) -> Result<SessionTicket> {
        if self.free_plays == 0 {
            return Err(eyre!("no free plays left for {player}"));
        }
        self.free_plays = self.free_plays.saturating_sub(1);
        info!(player, level, "session approved");
        Ok(SessionTicket { free_play: true })
    }

    fn reward_for_level(&self, level: u32) -> u64 {
        self.rewards.get(&level).copied().unwrap_or(0)
    }

    async fn report_win(
        &mut self,
        player: &str,
        level: u32,
        reward: u64,
    ) -> Result<()> {
        let path = self.claims_path();
        let mut claims: Vec<ClaimRecord> = if path.exists() {
            let raw = fs::read_to_string(&path).wrap_err_with(|| {
                format!("failed to read {}", path.display())
            })?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        claims.push(ClaimRecord {
            player: player.to_string(),
            level,
            reward,
            credited_at: Utc::now(),
        });
        let raw = serde_json::to_string_pretty(&claims)?;
        fs::write(&path, raw)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        info!(player, level, reward, "win credited");
        Ok(())
    }
}

/// Game records in a single JSON file under the data dir.
pub struct JsonStats {
    path: PathBuf,
}

impl JsonStats {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).wrap_err_with(|| {
            format!("failed to create data dir {}", dir.display())
        })?;
        Ok(JsonStats {
            path: dir.join(STATS_FILE),
        })
    }

    fn load(&self) -> Result<Vec<GameRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).wrap_err_with(|| {
            format!("failed to read {}", self.path.display())
        })?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }
}

impl StatsService for JsonStats {
    async fn record_game(&mut self, record: &GameRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record.clone());
        let raw = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, raw).wrap_err_with(|| {
            format!("failed to write {}", self.path.display())
        })?;
        Ok(())
    }

    async fn last_level(&self, player: &str) -> Result<Option<u32>> {
        let records = self.load()?;
        Ok(records
            .iter()
            .filter(|r| r.player == player)
            .max_by_key(|r| r.finished_at)
            .map(|r| r.level))
    }
}
