use serde::{Deserialize, Serialize};

use crate::constants::{BOX_HEIGHT, INITIAL_COLS, MELTED_ANGLE};
use crate::rng::GameRng;

mod board;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Difficulty {
    Normal = 1,
    Rotate = 2,
    Flip = 3,
}

impl TryFrom<u32> for Difficulty {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Normal),
            2 => Ok(Self::Rotate),
            3 => Ok(Self::Flip),
            other => Err(other),
        }
    }
}

impl From<Difficulty> for u32 {
    fn from(value: Difficulty) -> Self {
        value as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Move {
    Left,
    Right,
    Up,
    Down,
}

impl Move {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// One ring piece. `angle == MELTED_ANGLE` marks a cell cleared by a melt
/// and waiting for the next compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Torus {
    pub color: u8,
    pub angle: i8,
}

impl Torus {
    #[inline]
    pub fn is_melted(&self) -> bool {
        self.angle == MELTED_ANGLE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PoleCell {
    Empty,
    Piece(Torus),
    Marker,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Paused,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub score: u64,
    pub level: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Inactive,
    Advanced,
    GameOver(GameOverPayload),
}

/// The values a replay proof claims and the oracle recomputes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub score: u64,
    pub level: u32,
    pub time: u64,
    pub game_on: bool,
}

/// Authoritative state machine for one play session.
///
/// `grid` is the box, addressed `[row][col]` with row 0 at the bottom of every
/// stack. `pole` is addressed the same way with row 0 adjacent to the box; the
/// active column holds picked-up pieces in rows `0..num_tori_in_pole` and the
/// pole marker below them.
#[derive(Clone, Debug)]
pub struct Engine {
    pub(crate) difficulty: Difficulty,
    pub(crate) phase: Phase,
    pub(crate) num_cols: usize,
    pub(crate) grid: Vec<Vec<Option<Torus>>>,
    pub(crate) pole: Vec<Vec<PoleCell>>,
    pub(crate) num_tori: Vec<usize>,
    pub(crate) flying_tori: Vec<Option<u8>>,
    pub(crate) flying_tori_height: Vec<usize>,
    pub(crate) flying_tori_waiting: Vec<u32>,
    pub(crate) score: u64,
    pub(crate) level: u32,
    pub(crate) level_gauge: u32,
    pub(crate) time: u64,
    pub(crate) pole_pos: usize,
    pub(crate) num_tori_in_pole: usize,
    pub(crate) rng: GameRng,
}

impl Engine {
    /// A fresh, idle board.
    pub fn new(difficulty: Difficulty, rng: GameRng) -> Self {
        let num_cols = INITIAL_COLS;
        let pole_pos = num_cols / 2;
        Self {
            difficulty,
            phase: Phase::Idle,
            num_cols,
            grid: vec![vec![None; num_cols]; BOX_HEIGHT],
            pole: fresh_pole(num_cols, num_cols, pole_pos),
            num_tori: vec![0; num_cols],
            flying_tori: vec![None; num_cols],
            flying_tori_height: vec![0; num_cols],
            flying_tori_waiting: vec![0; num_cols],
            score: 0,
            level: 0,
            level_gauge: 0,
            time: 0,
            pole_pos,
            num_tori_in_pole: 0,
            rng,
        }
    }

    pub fn seeded(difficulty: Difficulty, seed: u32) -> Self {
        Self::new(difficulty, GameRng::seeded(seed))
    }

    /// Fresh board already in the running state.
    pub fn start_new_game(difficulty: Difficulty, seed: Option<u32>) -> Self {
        let rng = match seed {
            Some(seed) => GameRng::seeded(seed),
            None => GameRng::unseeded(),
        };
        let mut engine = Self::new(difficulty, rng);
        engine.phase = Phase::Running;
        engine
    }

    /// Idle -> Running. Returns false from any other phase.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Running;
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.phase = Phase::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        self.phase = Phase::Running;
        true
    }

    /// Back to Idle with a fresh board. The generator keeps its position.
    pub fn reset(&mut self) {
        *self = Self::new(self.difficulty, self.rng);
    }

    /// One logical step.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::Running {
            return TickOutcome::Inactive;
        }

        if self.has_overflow() {
            return self.finish();
        }

        self.remove_melted();
        self.advance_flying();
        self.melt_full_rows();

        self.time += 1;
        if self.time % crate::constants::GAUGE_PERIOD_TICKS == 0 {
            self.level_gauge += 1;
            if self.level_gauge >= self.level_up_threshold() {
                self.level_gauge = 0;
                self.level_up();
                if self.phase == Phase::GameOver {
                    return TickOutcome::GameOver(self.game_over_payload());
                }
            }
        }

        TickOutcome::Advanced
    }

    /// Applies a player move. Illegal or blocked moves change nothing and
    /// return false.
    pub fn apply_move(&mut self, mv: Move) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        match mv {
            Move::Left => self.shift_pole(-1),
            Move::Right => self.shift_pole(1),
            Move::Up => self.extract_up(),
            Move::Down => self.insert_down(),
        }
    }

    /// Forces GameOver if any column is full. Used when a run ends on a tick
    /// boundary the replay has not stepped past yet.
    pub fn finalize_if_overflowing(&mut self) -> Option<GameOverPayload> {
        if self.phase == Phase::Running && self.has_overflow() {
            match self.finish() {
                TickOutcome::GameOver(payload) => Some(payload),
                _ => None,
            }
        } else {
            None
        }
    }

    pub fn has_overflow(&self) -> bool {
        self.num_tori.iter().any(|&count| count >= BOX_HEIGHT)
    }

    fn finish(&mut self) -> TickOutcome {
        self.phase = Phase::GameOver;
        TickOutcome::GameOver(self.game_over_payload())
    }

    fn game_over_payload(&self) -> GameOverPayload {
        GameOverPayload {
            score: self.score,
            level: self.level,
        }
    }

    fn level_up_threshold(&self) -> u32 {
        crate::constants::LEVEL_UP_TIME * self.num_cols as u32
    }

    pub fn run_state(&self) -> RunState {
        RunState {
            score: self.score,
            level: self.level,
            time: self.time,
            game_on: self.is_running(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn level_gauge(&self) -> u32 {
        self.level_gauge
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn pole_height(&self) -> usize {
        self.pole.len()
    }

    pub fn pole_pos(&self) -> usize {
        self.pole_pos
    }

    pub fn num_tori_in_pole(&self) -> usize {
        self.num_tori_in_pole
    }

    pub fn num_tori(&self, col: usize) -> usize {
        self.num_tori.get(col).copied().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<Torus> {
        self.grid.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn pole_cell(&self, row: usize, col: usize) -> PoleCell {
        self.pole
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(PoleCell::Empty)
    }

    pub fn flying_torus(&self, col: usize) -> Option<(u8, usize)> {
        let color = self.flying_tori.get(col).copied().flatten()?;
        Some((color, self.flying_tori_height[col]))
    }

    pub fn rng(&self) -> &GameRng {
        &self.rng
    }
}

pub(crate) fn fresh_pole(height: usize, num_cols: usize, pole_pos: usize) -> Vec<Vec<PoleCell>> {
    (0..height)
        .map(|_| {
            let mut row = vec![PoleCell::Empty; num_cols];
            row[pole_pos] = PoleCell::Marker;
            row
        })
        .collect()
}

/// Replays a move log from a fresh seeded engine for `ticks` ticks, applying
/// each move once the clock reaches its time. Stops early at game over.
pub fn simulate(
    difficulty: Difficulty,
    seed: u32,
    moves: &[(u64, Move)],
    ticks: u64,
) -> RunState {
    let mut engine = Engine::seeded(difficulty, seed);
    engine.start();
    let mut pending = moves.iter().peekable();

    loop {
        while let Some((_, mv)) = pending.next_if(|(time, _)| *time <= engine.time()) {
            engine.apply_move(*mv);
        }
        if engine.time() >= ticks || !engine.is_running() {
            break;
        }
        engine.tick();
    }

    engine.run_state()
}
