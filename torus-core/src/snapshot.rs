use serde::{Deserialize, Serialize};

use crate::constants::{
    ANGLE_PHASES, BOX_HEIGHT, GAUGE_PERIOD_TICKS, INITIAL_COLS, LEVEL_UP_TIME, MAX_COLS,
    MAX_FINAL_TIME, MELTED_ANGLE, MIN_POLE_HEIGHT, NUM_COLORS, SCORE_PER_TORUS, SNAPSHOT_VERSION,
    SPAWN_WAIT_TICKS,
};
use crate::error::SnapshotError;
use crate::rng::{GameRng, RngMode};
use crate::sim::{Difficulty, Engine, Phase, PoleCell, Torus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngSnapshot {
    pub mode: RngMode,
    pub state: u32,
}

/// Everything needed to resume a session, including the generator position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub version: u32,
    pub difficulty: u32,
    pub phase: Phase,
    pub num_cols: usize,
    #[serde(rename = "box")]
    pub grid: Vec<Vec<Option<Torus>>>,
    pub pole: Vec<Vec<PoleCell>>,
    pub num_tori: Vec<usize>,
    pub flying_tori: Vec<Option<u8>>,
    pub flying_tori_height: Vec<usize>,
    pub flying_tori_waiting: Vec<u32>,
    pub score: u64,
    pub level: u32,
    pub level_gauge: u32,
    pub time: u64,
    pub pole_pos: usize,
    pub num_tori_in_pole: usize,
    pub rng: RngSnapshot,
}

impl Engine {
    pub fn export(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            difficulty: self.difficulty.into(),
            phase: self.phase,
            num_cols: self.num_cols,
            grid: self.grid.clone(),
            pole: self.pole.clone(),
            num_tori: self.num_tori.clone(),
            flying_tori: self.flying_tori.clone(),
            flying_tori_height: self.flying_tori_height.clone(),
            flying_tori_waiting: self.flying_tori_waiting.clone(),
            score: self.score,
            level: self.level,
            level_gauge: self.level_gauge,
            time: self.time,
            pole_pos: self.pole_pos,
            num_tori_in_pole: self.num_tori_in_pole,
            rng: RngSnapshot {
                mode: self.rng.mode(),
                state: self.rng.state(),
            },
        }
    }

    /// Rebuilds an engine from a snapshot after checking every dimension and
    /// cell. A snapshot taken mid-run comes back paused.
    pub fn import(snapshot: EngineSnapshot) -> Result<Engine, SnapshotError> {
        let difficulty = validate(&snapshot).inspect_err(|err| {
            tracing::warn!(error = %err, "rejected engine snapshot");
        })?;
        let rng = GameRng::from_parts(snapshot.rng.mode, snapshot.rng.state)
            .ok_or(SnapshotError::InvalidRngState)?;

        let phase = match snapshot.phase {
            Phase::Running => Phase::Paused,
            other => other,
        };

        Ok(Engine {
            difficulty,
            phase,
            num_cols: snapshot.num_cols,
            grid: snapshot.grid,
            pole: snapshot.pole,
            num_tori: snapshot.num_tori,
            flying_tori: snapshot.flying_tori,
            flying_tori_height: snapshot.flying_tori_height,
            flying_tori_waiting: snapshot.flying_tori_waiting,
            score: snapshot.score,
            level: snapshot.level,
            level_gauge: snapshot.level_gauge,
            time: snapshot.time,
            pole_pos: snapshot.pole_pos,
            num_tori_in_pole: snapshot.num_tori_in_pole,
            rng,
        })
    }

    pub fn export_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(&self.export()).map_err(|err| SnapshotError::Json {
            message: err.to_string(),
        })
    }

    pub fn import_json(json: &str) -> Result<Engine, SnapshotError> {
        let snapshot: EngineSnapshot =
            serde_json::from_str(json).map_err(|err| SnapshotError::Json {
                message: err.to_string(),
            })?;
        Self::import(snapshot)
    }
}

fn piece_in_range(torus: &Torus) -> bool {
    torus.color < NUM_COLORS && (MELTED_ANGLE..ANGLE_PHASES).contains(&torus.angle)
}

/// Every level-up needs at least one gauge step.
const MAX_LEVEL: u64 = MAX_FINAL_TIME / GAUGE_PERIOD_TICKS;

/// A full board melting on every tick of the longest run.
const MAX_SCORE: u64 = MAX_FINAL_TIME * SCORE_PER_TORUS * (BOX_HEIGHT * MAX_COLS) as u64;

fn check_at_most(field: &'static str, value: u64, max: u64) -> Result<(), SnapshotError> {
    if value > max {
        return Err(SnapshotError::ValueOutOfRange { field, value, max });
    }
    Ok(())
}

fn check_len(counter: &'static str, actual: usize, expected: usize) -> Result<(), SnapshotError> {
    if actual != expected {
        return Err(SnapshotError::CounterLengthMismatch {
            counter,
            expected,
            actual,
        });
    }
    Ok(())
}

fn validate(snapshot: &EngineSnapshot) -> Result<Difficulty, SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
        });
    }
    let difficulty = Difficulty::try_from(snapshot.difficulty)
        .map_err(|found| SnapshotError::InvalidDifficulty { found })?;

    let num_cols = snapshot.num_cols;
    if !(INITIAL_COLS..=MAX_COLS).contains(&num_cols) {
        return Err(SnapshotError::ColumnCountOutOfRange { num_cols });
    }

    if snapshot.grid.len() != BOX_HEIGHT {
        return Err(SnapshotError::BoxHeightMismatch {
            expected: BOX_HEIGHT,
            actual: snapshot.grid.len(),
        });
    }
    for (row, cells) in snapshot.grid.iter().enumerate() {
        if cells.len() != num_cols {
            return Err(SnapshotError::RowLengthMismatch {
                grid: "box",
                row,
                expected: num_cols,
                actual: cells.len(),
            });
        }
    }

    let pole_height = snapshot.pole.len();
    if !(MIN_POLE_HEIGHT..=num_cols).contains(&pole_height) {
        return Err(SnapshotError::PoleHeightOutOfRange {
            height: pole_height,
            num_cols,
        });
    }
    for (row, cells) in snapshot.pole.iter().enumerate() {
        if cells.len() != num_cols {
            return Err(SnapshotError::RowLengthMismatch {
                grid: "pole",
                row,
                expected: num_cols,
                actual: cells.len(),
            });
        }
    }

    check_len("numTori", snapshot.num_tori.len(), num_cols)?;
    check_len("flyingTori", snapshot.flying_tori.len(), num_cols)?;
    check_len("flyingToriHeight", snapshot.flying_tori_height.len(), num_cols)?;
    check_len("flyingToriWaiting", snapshot.flying_tori_waiting.len(), num_cols)?;

    if snapshot.pole_pos >= num_cols {
        return Err(SnapshotError::PolePositionOutOfRange {
            pole_pos: snapshot.pole_pos,
            num_cols,
        });
    }

    for col in 0..num_cols {
        let count = snapshot.num_tori[col];
        if count > BOX_HEIGHT {
            return Err(SnapshotError::ColumnStackMismatch { col });
        }
        for (row, cells) in snapshot.grid.iter().enumerate() {
            match &cells[col] {
                Some(torus) if row < count => {
                    if !piece_in_range(torus) {
                        return Err(SnapshotError::PieceOutOfRange { row, col });
                    }
                }
                None if row >= count => {}
                _ => return Err(SnapshotError::ColumnStackMismatch { col }),
            }
        }
    }

    let held = snapshot.num_tori_in_pole;
    for (row, cells) in snapshot.pole.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let consistent = match cell {
                PoleCell::Empty => col != snapshot.pole_pos,
                PoleCell::Marker => col == snapshot.pole_pos && row >= held,
                PoleCell::Piece(torus) => {
                    col == snapshot.pole_pos
                        && row < held
                        && !torus.is_melted()
                        && piece_in_range(torus)
                }
            };
            if !consistent {
                return Err(SnapshotError::PoleLayoutMismatch { row, col });
            }
        }
    }
    if held > pole_height {
        return Err(SnapshotError::PoleLayoutMismatch {
            row: pole_height,
            col: snapshot.pole_pos,
        });
    }

    for col in 0..num_cols {
        if matches!(snapshot.flying_tori[col], Some(color) if color >= NUM_COLORS)
            || snapshot.flying_tori_height[col] > BOX_HEIGHT
            || snapshot.flying_tori_waiting[col] > SPAWN_WAIT_TICKS
        {
            return Err(SnapshotError::FlyingPieceOutOfRange { col });
        }
    }

    check_at_most("time", snapshot.time, MAX_FINAL_TIME)?;
    check_at_most("level", u64::from(snapshot.level), MAX_LEVEL)?;
    check_at_most("score", snapshot.score, MAX_SCORE)?;
    let gauge_max = u64::from(LEVEL_UP_TIME) * num_cols as u64 - 1;
    check_at_most("levelGauge", u64::from(snapshot.level_gauge), gauge_max)?;

    if snapshot.rng.state == 0 {
        return Err(SnapshotError::InvalidRngState);
    }

    Ok(difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Move;

    fn mid_game() -> Engine {
        let mut engine = Engine::seeded(Difficulty::Rotate, 2024);
        engine.start();
        for step in 0..400u64 {
            if step % 9 == 0 {
                engine.apply_move(if step % 2 == 0 { Move::Down } else { Move::Left });
            }
            if step % 13 == 0 {
                engine.apply_move(Move::Right);
            }
            engine.tick();
        }
        assert!(engine.is_running());
        engine
    }

    #[test]
    fn export_import_continues_identically() {
        let mut original = mid_game();
        let mut restored = Engine::import(original.export()).unwrap();

        assert_eq!(restored.phase(), Phase::Paused);
        assert!(restored.resume());
        for _ in 0..500 {
            assert_eq!(original.tick(), restored.tick());
            assert_eq!(original.run_state(), restored.run_state());
        }
        assert_eq!(original.export(), restored.export());
    }

    #[test]
    fn json_uses_wire_names() {
        let engine = mid_game();
        let json = engine.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert_eq!(value["box"].as_array().unwrap().len(), BOX_HEIGHT);
        assert_eq!(value["rng"]["mode"], "seeded");
        assert!(value["numToriInPole"].is_u64());
        assert_eq!(value["phase"], "running");

        let restored = Engine::import_json(&json).unwrap();
        assert_eq!(restored.score(), engine.score());
        assert_eq!(restored.rng().state(), engine.rng().state());
    }

    #[test]
    fn idle_and_finished_phases_are_kept() {
        let idle = Engine::seeded(Difficulty::Normal, 1);
        assert_eq!(Engine::import(idle.export()).unwrap().phase(), Phase::Idle);

        let mut over = idle.export();
        over.phase = Phase::GameOver;
        assert_eq!(Engine::import(over).unwrap().phase(), Phase::GameOver);
    }

    #[test]
    fn default_rng_mode_round_trips() {
        let engine = Engine::start_new_game(Difficulty::Normal, None);
        let snapshot = engine.export();
        assert_eq!(snapshot.rng.mode, RngMode::Default);
        let restored = Engine::import(snapshot).unwrap();
        assert_eq!(restored.rng(), engine.rng());
    }

    #[test]
    fn rejects_inconsistent_dimensions() {
        let good = mid_game().export();

        let mut snap = good.clone();
        snap.version = 9;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::UnsupportedVersion { found: 9 }
        );

        let mut snap = good.clone();
        snap.difficulty = 0;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::InvalidDifficulty { found: 0 })
        ));

        let mut snap = good.clone();
        snap.num_cols = MAX_COLS + 1;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::ColumnCountOutOfRange { .. })
        ));

        let mut snap = good.clone();
        snap.grid.pop();
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::BoxHeightMismatch { .. })
        ));

        let mut snap = good.clone();
        snap.grid[4].push(None);
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::RowLengthMismatch { grid: "box", row: 4, .. })
        ));

        let mut snap = good.clone();
        let row = snap.pole[0].clone();
        while snap.pole.len() <= snap.num_cols {
            snap.pole.push(row.clone());
        }
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::PoleHeightOutOfRange { .. })
        ));

        let mut snap = good.clone();
        snap.flying_tori_waiting.push(0);
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::CounterLengthMismatch {
                counter: "flyingToriWaiting",
                ..
            })
        ));

        let mut snap = good;
        snap.pole_pos = snap.num_cols;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::PolePositionOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_inconsistent_cells() {
        let mut engine = Engine::seeded(Difficulty::Normal, 1);
        engine.start();
        engine.grid[0][0] = Some(Torus { color: 1, angle: 3 });
        engine.num_tori[0] = 1;
        let good = engine.export();
        assert!(Engine::import(good.clone()).is_ok());

        let mut snap = good.clone();
        snap.num_tori[0] = 2;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::ColumnStackMismatch { col: 0 }
        );

        let mut snap = good.clone();
        snap.grid[0][0] = Some(Torus { color: 4, angle: 0 });
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::PieceOutOfRange { row: 0, col: 0 }
        );

        let mut snap = good.clone();
        snap.pole[0][0] = PoleCell::Marker;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::PoleLayoutMismatch { row: 0, col: 0 }
        );

        let mut snap = good.clone();
        snap.num_tori_in_pole = 1;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::PoleLayoutMismatch { .. })
        ));

        let mut snap = good.clone();
        snap.flying_tori[2] = Some(NUM_COLORS);
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::FlyingPieceOutOfRange { col: 2 }
        );

        let mut snap = good;
        snap.rng.state = 0;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::InvalidRngState
        );
    }

    #[test]
    fn rejects_counters_past_their_bounds() {
        let good = mid_game().export();
        let gauge_max = u64::from(LEVEL_UP_TIME) * good.num_cols as u64 - 1;

        let mut snap = good.clone();
        snap.time = u64::MAX;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::ValueOutOfRange {
                field: "time",
                value: u64::MAX,
                max: MAX_FINAL_TIME
            }
        );

        let mut snap = good.clone();
        snap.level_gauge = u32::MAX;
        assert_eq!(
            Engine::import(snap).unwrap_err(),
            SnapshotError::ValueOutOfRange {
                field: "levelGauge",
                value: u64::from(u32::MAX),
                max: gauge_max
            }
        );

        let mut snap = good.clone();
        snap.level = u32::MAX;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::ValueOutOfRange { field: "level", .. })
        ));

        let mut snap = good.clone();
        snap.score = u64::MAX;
        assert!(matches!(
            Engine::import(snap),
            Err(SnapshotError::ValueOutOfRange { field: "score", .. })
        ));

        let mut snap = good;
        snap.time = MAX_FINAL_TIME;
        snap.level_gauge = gauge_max as u32;
        let mut engine = Engine::import(snap).unwrap();
        assert!(engine.resume());
        for _ in 0..GAUGE_PERIOD_TICKS {
            engine.tick();
        }
        assert!(engine.time() >= MAX_FINAL_TIME);
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        assert!(matches!(
            Engine::import_json("{\"version\":1"),
            Err(SnapshotError::Json { .. })
        ));
        assert!(matches!(
            Engine::import_json("[]"),
            Err(SnapshotError::Json { .. })
        ));
    }
}
