//! Joybit: an 8x8 Match-3 engine and the terminal client that plays
//! it. The engine modules are pure (grid in, grid out); the session
//! serializes them into one authoritative game state, and the client
//! reports finished games to pluggable reward-ledger and stats
//! collaborators.

pub mod cascade;
pub mod client;
pub mod gravity;
pub mod grid;
pub mod ledger;
pub mod level;
pub mod matches;
pub mod moves;
pub mod session;
pub mod shuffle;
pub mod ui;

pub mod test_helpers;

pub use grid::{GRID_SIZE, Grid, Position, TIME_BONUS_KIND, Tile};
pub use session::{BoosterKind, Boosters, GameSession, Outcome, Phase};
