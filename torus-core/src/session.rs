use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::replay::{ReplayProof, ReplayRecorder};
use crate::rng::{GameRng, RngMode};
use crate::sim::{Difficulty, Engine, GameOverPayload, Move, Phase, TickOutcome};
use crate::snapshot::EngineSnapshot;

/// Receives a frame after every tick or move, and the game-over payload once
/// per run.
pub trait SessionObserver: Send {
    fn on_frame(&mut self, frame: &EngineSnapshot);

    fn on_game_over(&mut self, _payload: GameOverPayload) {}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub engine: EngineSnapshot,
    pub recorder: Option<ReplayRecorder>,
}

/// One client play session: the engine, the replay log of a seeded run and
/// whoever is watching.
pub struct Session {
    engine: Engine,
    recorder: Option<ReplayRecorder>,
    proof: Option<ReplayProof>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl Session {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            engine: Engine::new(difficulty, GameRng::unseeded()),
            recorder: None,
            proof: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Seeded runs get a replay recorder; casual runs do not.
    pub fn start_new_game(&mut self, difficulty: Difficulty, seed: Option<u32>) {
        self.engine = Engine::start_new_game(difficulty, seed);
        self.recorder = seed.map(|seed| ReplayRecorder::new(difficulty, seed));
        self.proof = None;
        tracing::info!(
            difficulty = u32::from(difficulty),
            seeded = seed.is_some(),
            "session started"
        );
        self.notify_frame();
    }

    pub fn pause(&mut self) -> bool {
        let changed = self.engine.pause();
        if changed {
            tracing::debug!(time = self.engine.time(), "session paused");
            self.notify_frame();
        }
        changed
    }

    pub fn resume(&mut self) -> bool {
        let changed = self.engine.resume();
        if changed {
            tracing::debug!(time = self.engine.time(), "session resumed");
            self.notify_frame();
        }
        changed
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.recorder = None;
        self.proof = None;
        tracing::debug!("session reset");
        self.notify_frame();
    }

    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.engine.tick();
        match outcome {
            TickOutcome::Inactive => {}
            TickOutcome::Advanced => self.notify_frame(),
            TickOutcome::GameOver(payload) => {
                self.notify_frame();
                self.finish(payload);
            }
        }
        outcome
    }

    /// Logs the move at the current logical time while the run is live, then
    /// hands it to the engine. Blocked moves are still logged; replay treats
    /// them as no-ops too.
    pub fn dispatch(&mut self, mv: Move) -> bool {
        if !self.engine.is_running() {
            return false;
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(self.engine.time(), mv);
        }
        let applied = self.engine.apply_move(mv);
        self.notify_frame();
        applied
    }

    /// The frozen proof of the last seeded run, once it has ended.
    pub fn replay_proof(&self) -> Option<&ReplayProof> {
        self.proof.as_ref()
    }

    pub fn export(&self) -> SessionSnapshot {
        SessionSnapshot {
            engine: self.engine.export(),
            recorder: self.recorder.clone(),
        }
    }

    /// Restores engine and recorder in place. Observers stay subscribed.
    ///
    /// A replay log is only restored if replaying it from its seed rebuilds
    /// the saved board; otherwise the session is left untouched.
    pub fn import(&mut self, snapshot: SessionSnapshot) -> Result<(), SnapshotError> {
        let engine = Engine::import(snapshot.engine)?;
        if let Some(recorder) = &snapshot.recorder {
            check_recorder(recorder, &engine).inspect_err(|err| {
                tracing::warn!(error = %err, "rejected session replay log");
            })?;
        }
        self.proof = match (&snapshot.recorder, engine.phase()) {
            (Some(recorder), Phase::GameOver) => {
                Some(recorder.finish(engine.score(), engine.level(), engine.time()))
            }
            _ => None,
        };
        self.engine = engine;
        self.recorder = snapshot.recorder;
        tracing::debug!(time = self.engine.time(), "session restored");
        self.notify_frame();
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(&self.export()).map_err(|err| SnapshotError::Json {
            message: err.to_string(),
        })
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), SnapshotError> {
        let snapshot = serde_json::from_str(json).map_err(|err| SnapshotError::Json {
            message: err.to_string(),
        })?;
        self.import(snapshot)
    }

    fn finish(&mut self, payload: GameOverPayload) {
        self.proof = self
            .recorder
            .as_ref()
            .map(|recorder| recorder.finish(payload.score, payload.level, self.engine.time()));
        tracing::info!(
            score = payload.score,
            level = payload.level,
            time = self.engine.time(),
            inputs = self.proof.as_ref().map_or(0, |proof| proof.inputs.len()),
            "game over"
        );
        for observer in self.observers.iter_mut() {
            observer.on_game_over(payload);
        }
    }

    fn notify_frame(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let frame = self.engine.export();
        for observer in self.observers.iter_mut() {
            observer.on_frame(&frame);
        }
    }
}

fn check_recorder(recorder: &ReplayRecorder, engine: &Engine) -> Result<(), SnapshotError> {
    if engine.rng().mode() != RngMode::Seeded {
        return Err(SnapshotError::RecorderWithoutSeed);
    }
    if recorder.difficulty() != engine.difficulty() {
        return Err(SnapshotError::RecorderDifficultyMismatch {
            recorder: recorder.difficulty().into(),
            engine: engine.difficulty().into(),
        });
    }

    let mut rebuilt = Engine::start_new_game(recorder.difficulty(), Some(recorder.seed()));
    let mut previous = 0;
    for (index, input) in recorder.inputs().iter().enumerate() {
        if input.time < previous {
            return Err(SnapshotError::RecorderInputOutOfOrder { index });
        }
        if input.time > engine.time() {
            return Err(SnapshotError::RecorderInputAfterTime {
                time: input.time,
                engine_time: engine.time(),
            });
        }
        while rebuilt.is_running() && rebuilt.time() < input.time {
            rebuilt.tick();
        }
        rebuilt.apply_move(input.mv);
        previous = input.time;
    }
    while rebuilt.is_running() && rebuilt.time() < engine.time() {
        rebuilt.tick();
    }

    let mut expected = rebuilt.export();
    expected.phase = engine.phase();
    if expected != engine.export() {
        return Err(SnapshotError::RecorderReplayMismatch {
            seed: recorder.seed(),
        });
    }
    Ok(())
}
