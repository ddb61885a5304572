use serde::{Deserialize, Serialize};

use crate::constants::{MAX_FINAL_TIME, MAX_INPUTS, REPLAY_VERSION};
use crate::error::{RejectedRun, Rejection};
use crate::replay::ReplayProof;
use crate::sim::{Difficulty, Engine, RunState};

/// Compute ceilings for one verification. Values above the hard ceilings are
/// clamped down to them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyLimits {
    pub max_final_time: u64,
    pub max_inputs: usize,
}

impl Default for VerifyLimits {
    fn default() -> Self {
        Self {
            max_final_time: MAX_FINAL_TIME,
            max_inputs: MAX_INPUTS,
        }
    }
}

impl VerifyLimits {
    pub fn new(max_final_time: u64, max_inputs: usize) -> Self {
        Self {
            max_final_time,
            max_inputs,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            max_final_time: self.max_final_time.min(MAX_FINAL_TIME),
            max_inputs: self.max_inputs.min(MAX_INPUTS),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub ok: bool,
    pub reason: Option<String>,
    pub actual: RunState,
    pub expected: RunState,
}

impl ReplayProof {
    /// The final state this proof claims.
    pub fn claimed_state(&self) -> RunState {
        RunState {
            score: self.final_score,
            level: self.final_level,
            time: self.final_time,
            game_on: false,
        }
    }
}

pub fn verify(proof: &ReplayProof) -> VerificationResult {
    verify_with_limits(proof, VerifyLimits::default())
}

pub fn verify_with_limits(proof: &ReplayProof, limits: VerifyLimits) -> VerificationResult {
    let expected = proof.claimed_state();
    match check_with_limits(proof, limits) {
        Ok(actual) => VerificationResult {
            ok: true,
            reason: None,
            actual,
            expected,
        },
        Err(rejected) => VerificationResult {
            ok: false,
            reason: Some(rejected.rejection.to_string()),
            actual: rejected.actual,
            expected,
        },
    }
}

pub fn check(proof: &ReplayProof) -> Result<RunState, RejectedRun> {
    check_with_limits(proof, VerifyLimits::default())
}

pub fn check_with_limits(
    proof: &ReplayProof,
    limits: VerifyLimits,
) -> Result<RunState, RejectedRun> {
    let difficulty = validate(proof, limits.clamped()).map_err(|rejection| RejectedRun {
        rejection,
        actual: RunState::default(),
    })?;

    let engine = replay(proof, difficulty)?;
    let actual = engine.run_state();
    compare(proof, actual).map_err(|rejection| RejectedRun { rejection, actual })?;
    Ok(actual)
}

fn validate(proof: &ReplayProof, limits: VerifyLimits) -> Result<Difficulty, Rejection> {
    if proof.version != REPLAY_VERSION {
        return Err(Rejection::UnsupportedVersion {
            found: proof.version,
        });
    }

    let difficulty = Difficulty::try_from(proof.difficulty)
        .map_err(|found| Rejection::InvalidDifficulty { found })?;

    if proof.final_time > limits.max_final_time {
        return Err(Rejection::FinalTimeOutOfRange {
            final_time: proof.final_time,
            max: limits.max_final_time,
        });
    }

    if proof.inputs.len() > limits.max_inputs {
        return Err(Rejection::TooManyInputs {
            count: proof.inputs.len(),
            max: limits.max_inputs,
        });
    }

    Ok(difficulty)
}

fn advance_to(engine: &mut Engine, target: u64) {
    while engine.is_running() && engine.time() < target {
        engine.tick();
    }
}

fn replay(proof: &ReplayProof, difficulty: Difficulty) -> Result<Engine, RejectedRun> {
    let mut engine = Engine::seeded(difficulty, proof.seed);
    engine.start();

    let mut previous = 0;
    for (index, input) in proof.inputs.iter().enumerate() {
        let rejection = if input.time < previous {
            Some(Rejection::InputOutOfOrder {
                index,
                time: input.time,
                previous,
            })
        } else if input.time > proof.final_time {
            Some(Rejection::InputAfterFinalTime {
                index,
                time: input.time,
                final_time: proof.final_time,
            })
        } else {
            advance_to(&mut engine, input.time);
            (!engine.is_running()).then(|| Rejection::EndedBeforeInputs {
                index,
                time: input.time,
                ended_at: engine.time(),
            })
        };
        if let Some(rejection) = rejection {
            return Err(RejectedRun {
                rejection,
                actual: engine.run_state(),
            });
        }

        engine.apply_move(input.mv);
        previous = input.time;
    }

    advance_to(&mut engine, proof.final_time);
    engine.finalize_if_overflowing();

    // One-tick grace for clients that flag the overflow a tick late. With
    // this engine's tick order a live tick always moves past `final_time`,
    // so the grace cannot change a verdict.
    // TODO: drop once client and oracle share the same overflow ordering.
    if engine.is_running() {
        let mut extra = engine.clone();
        extra.tick();
        let state = extra.run_state();
        if !state.game_on
            && state.time == proof.final_time
            && state.score == proof.final_score
            && state.level == proof.final_level
        {
            engine = extra;
        }
    }

    Ok(engine)
}

fn compare(proof: &ReplayProof, actual: RunState) -> Result<(), Rejection> {
    if actual.time != proof.final_time {
        return Err(Rejection::TimeMismatch {
            claimed: proof.final_time,
            computed: actual.time,
        });
    }
    if actual.score != proof.final_score {
        return Err(Rejection::ScoreMismatch {
            claimed: proof.final_score,
            computed: actual.score,
        });
    }
    if actual.level != proof.final_level {
        return Err(Rejection::LevelMismatch {
            claimed: proof.final_level,
            computed: actual.level,
        });
    }
    // A zero-tick claim is an abandoned run that never left the starting
    // board, so it is accepted while still running.
    if actual.game_on && proof.final_time > 0 {
        return Err(Rejection::StillRunning { time: actual.time });
    }
    Ok(())
}
