use serde::{Deserialize, Serialize};
use torus_core::VerificationResult;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct SkillUsage {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) hotkey: Option<String>,
    #[serde(default)]
    pub(crate) command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ScoreEntry {
    pub(crate) user: String,
    pub(crate) score: i64,
    pub(crate) level: i64,
    pub(crate) date: String,
    #[serde(rename = "skillUsage", default)]
    pub(crate) skill_usage: Vec<SkillUsage>,
}

/// The proof stays untyped until the handler decodes it, so malformed
/// proofs get a proper error code instead of an extractor failure.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitScoreRequest {
    pub(crate) entry: ScoreEntry,
    pub(crate) client_uuid: Uuid,
    #[serde(default)]
    pub(crate) challenge_id: Option<String>,
    pub(crate) proof: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct ScoresQuery {
    #[serde(default)]
    pub(crate) limit: Option<u32>,
    #[serde(default)]
    pub(crate) challenge_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum UpsertOutcome {
    Inserted,
    Improved,
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Recorded { used: u32 },
    Exhausted { max: u32 },
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoresResponse {
    pub(crate) success: bool,
    pub(crate) board: String,
    pub(crate) entries: Vec<ScoreEntry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitScoreResponse {
    pub(crate) success: bool,
    pub(crate) board: String,
    pub(crate) outcome: UpsertOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) attempts_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) attempts_max: Option<u32>,
    pub(crate) verification: VerificationResult,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyResponse {
    pub(crate) success: bool,
    pub(crate) verification: VerificationResult,
    pub(crate) elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) service: &'static str,
    pub(crate) ruleset: &'static str,
    pub(crate) replay_version: u32,
    pub(crate) max_final_time: u64,
    pub(crate) max_inputs: usize,
    pub(crate) daily_max_attempts: u32,
    pub(crate) oracle_concurrency: usize,
    pub(crate) stored_scores: usize,
    pub(crate) auth_required: bool,
}
