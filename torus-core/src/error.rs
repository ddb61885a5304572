use core::fmt;

use crate::sim::RunState;

/// Failure to turn untrusted JSON into a typed replay proof.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeError {
    Json { message: String },
    NonFiniteNumber { field: &'static str },
    UnknownMove { index: usize, found: String },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { message } => write!(f, "malformed replay proof: {message}"),
            Self::NonFiniteNumber { field } => write!(f, "field {field} is not a finite number"),
            Self::UnknownMove { index, found } => {
                write!(f, "input {index} has unknown move {found:?}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Why the oracle refused a claimed run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedVersion { found: u32 },
    InvalidDifficulty { found: u32 },
    FinalTimeOutOfRange { final_time: u64, max: u64 },
    TooManyInputs { count: usize, max: usize },
    InputOutOfOrder { index: usize, time: u64, previous: u64 },
    InputAfterFinalTime { index: usize, time: u64, final_time: u64 },
    EndedBeforeInputs { index: usize, time: u64, ended_at: u64 },
    TimeMismatch { claimed: u64, computed: u64 },
    StillRunning { time: u64 },
    ScoreMismatch { claimed: u64, computed: u64 },
    LevelMismatch { claimed: u32, computed: u32 },
}

impl Rejection {
    /// Static failures are decided before any tick is simulated.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedVersion { .. }
                | Self::InvalidDifficulty { .. }
                | Self::FinalTimeOutOfRange { .. }
                | Self::TooManyInputs { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::InvalidDifficulty { .. } => "invalid_difficulty",
            Self::FinalTimeOutOfRange { .. } => "final_time_out_of_range",
            Self::TooManyInputs { .. } => "too_many_inputs",
            Self::InputOutOfOrder { .. } => "input_out_of_order",
            Self::InputAfterFinalTime { .. } => "input_after_final_time",
            Self::EndedBeforeInputs { .. } => "ended_before_inputs",
            Self::TimeMismatch { .. } => "final_time_mismatch",
            Self::StillRunning { .. } => "game_still_running",
            Self::ScoreMismatch { .. } => "final_score_mismatch",
            Self::LevelMismatch { .. } => "final_level_mismatch",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found } => write!(f, "unsupported proof version: {found}"),
            Self::InvalidDifficulty { found } => {
                write!(f, "invalid difficulty: {found} (allowed 1..=3)")
            }
            Self::FinalTimeOutOfRange { final_time, max } => {
                write!(f, "final time out of range: {final_time} (max {max})")
            }
            Self::TooManyInputs { count, max } => {
                write!(f, "too many inputs: {count} (max {max})")
            }
            Self::InputOutOfOrder {
                index,
                time,
                previous,
            } => write!(
                f,
                "input {index} is out of order: time {time} after {previous}"
            ),
            Self::InputAfterFinalTime {
                index,
                time,
                final_time,
            } => write!(
                f,
                "input {index} at time {time} is after the final time {final_time}"
            ),
            Self::EndedBeforeInputs {
                index,
                time,
                ended_at,
            } => write!(
                f,
                "game ended at time {ended_at} before all inputs were consumed (input {index} at time {time})"
            ),
            Self::TimeMismatch { claimed, computed } => {
                write!(f, "final time mismatch: claimed={claimed}, computed={computed}")
            }
            Self::StillRunning { time } => {
                write!(f, "game is still running at the final time {time}")
            }
            Self::ScoreMismatch { claimed, computed } => {
                write!(f, "final score mismatch: claimed={claimed}, computed={computed}")
            }
            Self::LevelMismatch { claimed, computed } => {
                write!(f, "final level mismatch: claimed={claimed}, computed={computed}")
            }
        }
    }
}

impl std::error::Error for Rejection {}

/// A rejection together with the state the oracle had reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRun {
    pub rejection: Rejection,
    pub actual: RunState,
}

impl fmt::Display for RejectedRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rejection)
    }
}

impl std::error::Error for RejectedRun {}

/// A persisted session that cannot be restored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    Json { message: String },
    UnsupportedVersion { found: u32 },
    InvalidDifficulty { found: u32 },
    ColumnCountOutOfRange { num_cols: usize },
    BoxHeightMismatch { expected: usize, actual: usize },
    RowLengthMismatch { grid: &'static str, row: usize, expected: usize, actual: usize },
    PoleHeightOutOfRange { height: usize, num_cols: usize },
    CounterLengthMismatch { counter: &'static str, expected: usize, actual: usize },
    PolePositionOutOfRange { pole_pos: usize, num_cols: usize },
    ColumnStackMismatch { col: usize },
    PieceOutOfRange { row: usize, col: usize },
    PoleLayoutMismatch { row: usize, col: usize },
    FlyingPieceOutOfRange { col: usize },
    ValueOutOfRange { field: &'static str, value: u64, max: u64 },
    InvalidRngState,
    RecorderWithoutSeed,
    RecorderDifficultyMismatch { recorder: u32, engine: u32 },
    RecorderInputOutOfOrder { index: usize },
    RecorderInputAfterTime { time: u64, engine_time: u64 },
    RecorderReplayMismatch { seed: u32 },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json { message } => write!(f, "malformed snapshot: {message}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported snapshot version: {found}")
            }
            Self::InvalidDifficulty { found } => write!(f, "invalid difficulty: {found}"),
            Self::ColumnCountOutOfRange { num_cols } => {
                write!(f, "column count out of range: {num_cols}")
            }
            Self::BoxHeightMismatch { expected, actual } => {
                write!(f, "box height mismatch: expected {expected}, got {actual}")
            }
            Self::RowLengthMismatch {
                grid,
                row,
                expected,
                actual,
            } => write!(
                f,
                "{grid} row {row} has {actual} cells, expected {expected}"
            ),
            Self::PoleHeightOutOfRange { height, num_cols } => write!(
                f,
                "pole height {height} out of range for {num_cols} columns"
            ),
            Self::CounterLengthMismatch {
                counter,
                expected,
                actual,
            } => write!(f, "{counter} has {actual} entries, expected {expected}"),
            Self::PolePositionOutOfRange { pole_pos, num_cols } => write!(
                f,
                "pole position {pole_pos} out of range for {num_cols} columns"
            ),
            Self::ColumnStackMismatch { col } => {
                write!(f, "box column {col} does not match its piece count")
            }
            Self::PieceOutOfRange { row, col } => {
                write!(f, "piece at row {row} col {col} has an invalid color or angle")
            }
            Self::PoleLayoutMismatch { row, col } => {
                write!(f, "pole cell at row {row} col {col} is inconsistent")
            }
            Self::FlyingPieceOutOfRange { col } => {
                write!(f, "flying piece in column {col} is out of range")
            }
            Self::ValueOutOfRange { field, value, max } => {
                write!(f, "{field} {value} exceeds {max}")
            }
            Self::InvalidRngState => write!(f, "rng state must be non-zero"),
            Self::RecorderWithoutSeed => {
                write!(f, "replay log attached to an unseeded engine")
            }
            Self::RecorderDifficultyMismatch { recorder, engine } => write!(
                f,
                "replay log difficulty {recorder} does not match engine difficulty {engine}"
            ),
            Self::RecorderInputOutOfOrder { index } => {
                write!(f, "replay log input {index} goes back in time")
            }
            Self::RecorderInputAfterTime { time, engine_time } => write!(
                f,
                "replay log input at time {time} is ahead of the engine at {engine_time}"
            ),
            Self::RecorderReplayMismatch { seed } => write!(
                f,
                "replay log with seed {seed} does not reproduce the saved board"
            ),
        }
    }
}

impl std::error::Error for SnapshotError {}
