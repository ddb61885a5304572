use serde::{Deserialize, Serialize};

use crate::constants::REPLAY_VERSION;
use crate::error::DecodeError;
use crate::sim::{Difficulty, Move};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub time: u64,
    #[serde(rename = "move")]
    pub mv: Move,
}

/// A claimed run: seed, difficulty, final values and the move log that
/// produced them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayProof {
    pub version: u32,
    /// Kept raw so an out-of-range value reaches the oracle as a rejection.
    pub difficulty: u32,
    pub seed: u32,
    pub final_time: u64,
    pub final_score: u64,
    pub final_level: u32,
    pub inputs: Vec<InputEvent>,
}

/// Untrusted JSON shape. Every number is whatever the sender wrote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireReplayProof {
    pub version: f64,
    pub difficulty: f64,
    pub seed: f64,
    pub final_time: f64,
    pub final_score: f64,
    pub final_level: f64,
    pub inputs: Vec<WireInputEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireInputEvent {
    pub time: f64,
    #[serde(rename = "move")]
    pub mv: String,
}

const U32_MODULUS: f64 = 4_294_967_296.0;

fn wire_number(value: f64, field: &'static str) -> Result<f64, DecodeError> {
    if !value.is_finite() {
        return Err(DecodeError::NonFiniteNumber { field });
    }
    Ok(value.trunc().max(0.0))
}

// `as` saturates, so oversized values land on the type's maximum.
fn wire_u32(value: f64, field: &'static str) -> Result<u32, DecodeError> {
    Ok(wire_number(value, field)? as u32)
}

fn wire_u64(value: f64, field: &'static str) -> Result<u64, DecodeError> {
    Ok(wire_number(value, field)? as u64)
}

impl ReplayProof {
    pub fn new(difficulty: Difficulty, seed: u32) -> Self {
        Self {
            version: REPLAY_VERSION,
            difficulty: difficulty.into(),
            seed,
            final_time: 0,
            final_score: 0,
            final_level: 0,
            inputs: Vec::new(),
        }
    }

    /// Truncates and clamps every number. Inputs are kept exactly as sent,
    /// ordering included.
    pub fn from_wire(wire: WireReplayProof) -> Result<Self, DecodeError> {
        let inputs = wire
            .inputs
            .into_iter()
            .enumerate()
            .map(|(index, event)| {
                let time = wire_u64(event.time, "inputs.time")?;
                let mv = Move::parse(&event.mv).ok_or(DecodeError::UnknownMove {
                    index,
                    found: event.mv,
                })?;
                Ok(InputEvent { time, mv })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(Self {
            version: wire_u32(wire.version, "version")?,
            difficulty: wire_u32(wire.difficulty, "difficulty")?,
            seed: (wire_number(wire.seed, "seed")? % U32_MODULUS) as u32,
            final_time: wire_u64(wire.final_time, "finalTime")?,
            final_score: wire_u64(wire.final_score, "finalScore")?,
            final_level: wire_u32(wire.final_level, "finalLevel")?,
            inputs,
        })
    }

    /// Drops every input whose time runs backwards relative to the last one
    /// kept.
    pub fn normalized(mut self) -> Self {
        let mut last = 0;
        self.inputs.retain(|event| {
            if event.time < last {
                return false;
            }
            last = event.time;
            true
        });
        self
    }
}

pub fn decode_proof(json: &str) -> Result<ReplayProof, DecodeError> {
    let wire: WireReplayProof = serde_json::from_str(json).map_err(|err| DecodeError::Json {
        message: err.to_string(),
    })?;
    ReplayProof::from_wire(wire)
}

pub fn encode_proof(proof: &ReplayProof) -> serde_json::Result<String> {
    serde_json::to_string(proof)
}

/// Client-side move log for one seeded run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRecorder {
    difficulty: Difficulty,
    seed: u32,
    inputs: Vec<InputEvent>,
}

impl ReplayRecorder {
    pub fn new(difficulty: Difficulty, seed: u32) -> Self {
        Self {
            difficulty,
            seed,
            inputs: Vec::new(),
        }
    }

    pub fn record(&mut self, time: u64, mv: Move) {
        self.inputs.push(InputEvent { time, mv });
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn inputs(&self) -> &[InputEvent] {
        &self.inputs
    }

    /// Freezes the log into a normalized proof carrying the final values.
    pub fn finish(&self, score: u64, level: u32, time: u64) -> ReplayProof {
        ReplayProof {
            final_time: time,
            final_score: score,
            final_level: level,
            inputs: self.inputs.clone(),
            ..ReplayProof::new(self.difficulty, self.seed)
        }
        .normalized()
    }
}
