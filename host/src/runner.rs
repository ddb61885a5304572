use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use torus_core::{check, decode_proof, Difficulty, ReplayProof, Session, TickOutcome};

use crate::bots::{create_bot, Bot};

#[derive(Clone, Debug, Serialize)]
pub struct RunMetrics {
    pub bot_id: String,
    pub seed: u32,
    pub difficulty: u32,
    pub final_time: u64,
    pub final_score: u64,
    pub final_level: u32,
    pub moves: usize,
    pub applied_moves: usize,
}

#[derive(Clone, Debug)]
pub struct RunArtifact {
    pub metrics: RunMetrics,
    pub proof: ReplayProof,
}

pub fn run_bot(
    bot_id: &str,
    seed: u32,
    difficulty: Difficulty,
    max_ticks: u64,
) -> Result<RunArtifact> {
    let mut bot = create_bot(bot_id).ok_or_else(|| anyhow!("unknown bot '{bot_id}'"))?;
    run_bot_instance(bot.as_mut(), seed, difficulty, max_ticks)
}

/// Plays one seeded run headless until game over and returns the proof the
/// client would submit, after checking it against the oracle.
pub fn run_bot_instance(
    bot: &mut dyn Bot,
    seed: u32,
    difficulty: Difficulty,
    max_ticks: u64,
) -> Result<RunArtifact> {
    if max_ticks == 0 {
        return Err(anyhow!("max_ticks must be > 0"));
    }

    let mut session = Session::new(difficulty);
    session.start_new_game(difficulty, Some(seed));

    let mut applied_moves = 0usize;
    loop {
        if session.engine().time() >= max_ticks {
            return Err(anyhow!(
                "bot '{}' was still alive after {max_ticks} ticks",
                bot.id()
            ));
        }
        if let Some(mv) = bot.next_move(session.engine()) {
            if session.dispatch(mv) {
                applied_moves += 1;
            }
        }
        if let TickOutcome::GameOver(_) = session.tick() {
            break;
        }
    }

    let proof = session
        .replay_proof()
        .cloned()
        .ok_or_else(|| anyhow!("seeded run ended without a replay proof"))?;
    check(&proof).map_err(|err| anyhow!("generated proof failed verification: {err}"))?;

    Ok(RunArtifact {
        metrics: RunMetrics {
            bot_id: bot.id().to_string(),
            seed,
            difficulty: difficulty.into(),
            final_time: proof.final_time,
            final_score: proof.final_score,
            final_level: proof.final_level,
            moves: proof.inputs.len(),
            applied_moves,
        },
        proof,
    })
}

pub fn write_proof(path: &Path, proof: &ReplayProof) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(proof).context("failed to serialize replay proof")?;
    fs::write(path, json).with_context(|| format!("failed writing {}", path.display()))
}

pub fn read_proof(path: &Path) -> Result<ReplayProof> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    decode_proof(&json).with_context(|| format!("invalid replay proof in {}", path.display()))
}
