//! Game rule constants shared by the client engine and the replay oracle.
//!
//! Changing any value here changes the outcome of every recorded run, so
//! bump `RULESET` alongside it.

pub const RULESET: &str = "torus-v1";

// Board geometry
pub const BOX_HEIGHT: usize = 20;
pub const INITIAL_COLS: usize = 3;
pub const MAX_COLS: usize = 16;
pub const MIN_POLE_HEIGHT: usize = 2;

// Pieces
pub const NUM_COLORS: u8 = 4;
pub const ANGLE_PHASES: i8 = 6;
pub const MELTED_ANGLE: i8 = -1;
pub const LANDING_ANGLE_EVEN: i8 = 0;
pub const LANDING_ANGLE_ODD: i8 = 3;

// Timing (in logical ticks)
pub const SPAWN_WAIT_TICKS: u32 = 12;
pub const GAUGE_PERIOD_TICKS: u64 = 10;
pub const LEVEL_UP_TIME: u32 = 10;

// Scoring
pub const SCORE_PER_TORUS: u64 = 10;

// Wire formats
pub const REPLAY_VERSION: u32 = 1;
pub const SNAPSHOT_VERSION: u32 = 1;

// Oracle compute ceilings
pub const MAX_FINAL_TIME: u64 = 2_000_000;
pub const MAX_INPUTS: usize = 20_000;

// Client tick loop
pub const TICK_INTERVAL_MS: u64 = 50;
