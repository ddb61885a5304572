use std::time::Instant;

use actix_web::{
    http::StatusCode,
    web::{Bytes, Data, Json, Query},
    HttpRequest, HttpResponse, Responder,
};
use torus_core::constants::{REPLAY_VERSION, RULESET};
use torus_core::{
    daily_seed, decode_proof, verify_with_limits, ReplayProof, VerificationResult,
    WireReplayProof,
};

use crate::auth::{may_submit_scores, missing_score_key};
use crate::response::{json_error_with_code, replay_rejected};
use crate::scoreboard::{board_for, normalize_limit, sanitize_entry};
use crate::store::VerifiedRun;
use crate::types::{
    AttemptOutcome, HealthResponse, ScoresQuery, ScoresResponse, SubmitScoreRequest,
    SubmitScoreResponse, VerifyResponse,
};
use crate::AppState;

/// Returns `(error_message, error_code)` on failure.
pub(crate) fn decode_proof_value(
    value: serde_json::Value,
) -> Result<ReplayProof, (String, &'static str)> {
    let wire: WireReplayProof = serde_json::from_value(value)
        .map_err(|err| (format!("malformed replay proof: {err}"), "invalid_proof"))?;
    ReplayProof::from_wire(wire).map_err(|err| (err.to_string(), "invalid_proof"))
}

/// Returns `(error_message, error_code)` on failure.
pub(crate) fn check_claim(
    entry_score: i64,
    entry_level: i64,
    proof: &ReplayProof,
) -> Result<(), (String, &'static str)> {
    let score_matches = u64::try_from(entry_score).is_ok_and(|score| score == proof.final_score);
    let level_matches = u32::try_from(entry_level).is_ok_and(|level| level == proof.final_level);
    if !score_matches || !level_matches {
        return Err((
            format!(
                "entry claims score={entry_score} level={entry_level} but the proof claims score={} level={}",
                proof.final_score, proof.final_level
            ),
            "claim_mismatch",
        ));
    }
    Ok(())
}

/// Replays on a blocking worker, bounded by the oracle semaphore.
pub(crate) async fn run_oracle(
    state: &AppState,
    proof: ReplayProof,
) -> Result<(VerificationResult, u64), String> {
    let _permit = state
        .oracle_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|err| format!("failed to acquire oracle semaphore: {err}"))?;

    let limits = state.policy.limits;
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || verify_with_limits(&proof, limits))
        .await
        .map_err(|err| format!("oracle worker join failure: {err}"))?;
    let elapsed_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

    tracing::info!(
        ok = result.ok,
        reason = result.reason.as_deref().unwrap_or(""),
        time = result.actual.time,
        score = result.actual.score,
        elapsed_ms,
        "replay verified"
    );
    Ok((result, elapsed_ms))
}

fn internal_error(context: &str, err: &str) -> HttpResponse {
    tracing::error!("{context}: {err}");
    json_error_with_code(
        StatusCode::INTERNAL_SERVER_ERROR,
        "score store error",
        Some("internal_error"),
    )
}

pub(crate) async fn health(state: Data<AppState>) -> impl Responder {
    let stored_scores = match state.scores.count() {
        Ok(count) => count,
        Err(e) => return internal_error("health check failed", &e),
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: "torus-api",
        ruleset: RULESET,
        replay_version: REPLAY_VERSION,
        max_final_time: state.policy.limits.max_final_time,
        max_inputs: state.policy.limits.max_inputs,
        daily_max_attempts: state.policy.daily_max_attempts,
        oracle_concurrency: state.oracle_concurrency,
        stored_scores,
        auth_required: state.auth_required(),
    })
}

/// Stateless verdict on a raw replay proof body.
pub(crate) async fn verify_replay(state: Data<AppState>, body: Bytes) -> impl Responder {
    if body.is_empty() {
        return json_error_with_code(
            StatusCode::BAD_REQUEST,
            "proof payload is empty",
            Some("proof_empty"),
        );
    }
    let Ok(json) = std::str::from_utf8(&body) else {
        return json_error_with_code(
            StatusCode::BAD_REQUEST,
            "proof payload is not UTF-8",
            Some("invalid_proof"),
        );
    };
    let proof = match decode_proof(json) {
        Ok(proof) => proof,
        Err(err) => {
            return json_error_with_code(
                StatusCode::BAD_REQUEST,
                err.to_string(),
                Some("invalid_proof"),
            )
        }
    };

    match run_oracle(&state, proof).await {
        Ok((verification, elapsed_ms)) => HttpResponse::Ok().json(VerifyResponse {
            success: true,
            verification,
            elapsed_ms,
        }),
        Err(err) => {
            tracing::error!("verify failed: {err}");
            json_error_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                "oracle failure",
                Some("internal_error"),
            )
        }
    }
}

pub(crate) async fn list_scores(
    state: Data<AppState>,
    query: Query<ScoresQuery>,
) -> impl Responder {
    let board = match board_for(query.challenge_id.as_deref()) {
        Ok(board) => board,
        Err((msg, code)) => return json_error_with_code(StatusCode::BAD_REQUEST, msg, Some(code)),
    };
    let limit = normalize_limit(query.limit);

    match state.scores.top(&board, limit) {
        Ok(entries) => HttpResponse::Ok().json(ScoresResponse {
            success: true,
            board,
            entries,
        }),
        Err(e) => internal_error("list_scores failed", &e),
    }
}

/// Verified leaderboard submission.
///
/// Static checks run first. A daily attempt is counted before the replay is
/// verified, so rejected replays still use one up; only accepted replays touch
/// the scores table.
pub(crate) async fn submit_score(
    state: Data<AppState>,
    req: HttpRequest,
    body: Json<SubmitScoreRequest>,
) -> impl Responder {
    if !may_submit_scores(req.headers(), state.score_key.as_deref()) {
        return missing_score_key();
    }
    let SubmitScoreRequest {
        entry,
        client_uuid,
        challenge_id,
        proof,
    } = body.into_inner();

    let entry = match sanitize_entry(entry) {
        Ok(entry) => entry,
        Err((msg, code)) => return json_error_with_code(StatusCode::BAD_REQUEST, msg, Some(code)),
    };
    let board = match board_for(challenge_id.as_deref()) {
        Ok(board) => board,
        Err((msg, code)) => return json_error_with_code(StatusCode::BAD_REQUEST, msg, Some(code)),
    };
    let proof = match decode_proof_value(proof) {
        Ok(proof) => proof,
        Err((msg, code)) => return json_error_with_code(StatusCode::BAD_REQUEST, msg, Some(code)),
    };
    if let Err((msg, code)) = check_claim(entry.score, entry.level, &proof) {
        return json_error_with_code(StatusCode::BAD_REQUEST, msg, Some(code));
    }

    let mut attempts_used = None;
    if challenge_id.is_some() {
        let expected_seed = daily_seed(&board);
        if proof.seed != expected_seed {
            return json_error_with_code(
                StatusCode::BAD_REQUEST,
                format!(
                    "proof seed {:#010x} is not the seed of challenge {board} ({expected_seed:#010x})",
                    proof.seed
                ),
                Some("wrong_seed"),
            );
        }

        match state
            .scores
            .record_attempt(&board, client_uuid, state.policy.daily_max_attempts)
        {
            Ok(AttemptOutcome::Recorded { used }) => attempts_used = Some(used),
            Ok(AttemptOutcome::Exhausted { max }) => {
                return json_error_with_code(
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("all {max} attempts at {board} are used"),
                    Some("attempts_exhausted"),
                )
            }
            Err(e) => return internal_error("record_attempt failed", &e),
        }
    }

    let run = VerifiedRun {
        seed: proof.seed,
        difficulty: proof.difficulty,
        final_time: proof.final_time,
    };
    let verification = match run_oracle(&state, proof).await {
        Ok((verification, _)) => verification,
        Err(err) => {
            tracing::error!("submit_score oracle failed: {err}");
            return json_error_with_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                "oracle failure",
                Some("internal_error"),
            );
        }
    };
    if !verification.ok {
        tracing::warn!(
            board = %board,
            client_uuid = %client_uuid,
            reason = verification.reason.as_deref().unwrap_or(""),
            "replay rejected"
        );
        return replay_rejected(&verification);
    }

    match state.scores.upsert_if_better(&board, client_uuid, &entry, run) {
        Ok(outcome) => {
            tracing::info!(
                board = %board,
                client_uuid = %client_uuid,
                score = entry.score,
                outcome = ?outcome,
                "score accepted"
            );
            HttpResponse::Ok().json(SubmitScoreResponse {
                success: true,
                board,
                outcome,
                attempts_used,
                attempts_max: attempts_used.map(|_| state.policy.daily_max_attempts),
                verification,
            })
        }
        Err(e) => internal_error("upsert_if_better failed", &e),
    }
}
