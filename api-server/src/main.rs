mod auth;
mod config;
mod handlers;
mod response;
mod scoreboard;
mod store;
mod types;

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use actix_cors::Cors;
use actix_web::{error::InternalError, http::StatusCode, middleware, web, App, HttpServer};

pub(crate) use config::{
    default_oracle_concurrency, read_env_string, read_env_usize, AppState, ServerPolicy,
    DEFAULT_BIND_ADDR, DEFAULT_DATA_DIR, DEFAULT_JSON_LIMIT_BYTES,
};
use handlers::{health, list_scores, submit_score, verify_replay};
use response::json_error_with_code;
pub(crate) use store::ScoreStore;

pub(crate) fn now_unix_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let response = json_error_with_code(
                StatusCode::BAD_REQUEST,
                format!("invalid request body: {err}"),
                Some("invalid_request"),
            );
            InternalError::from_response(err, response).into()
        })
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/api/verify", web::post().to(verify_replay))
        .route("/api/scores", web::get().to(list_scores))
        .route("/api/scores", web::post().to(submit_score));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let bind_addr =
        read_env_string("API_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let data_dir = PathBuf::from(
        read_env_string("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
    );
    let json_limit = read_env_usize("JSON_LIMIT_BYTES", DEFAULT_JSON_LIMIT_BYTES);
    let oracle_concurrency = read_env_usize("ORACLE_CONCURRENCY", default_oracle_concurrency());
    let score_key = read_env_string("SCORE_API_KEY");
    let policy = ServerPolicy::from_env();

    let scores = ScoreStore::open(&data_dir).map_err(std::io::Error::other)?;
    let state = AppState::new(scores, oracle_concurrency, policy, score_key);

    tracing::info!(
        "starting torus api: bind_addr={} data_dir={} oracle_concurrency={} max_final_time={} max_inputs={} daily_max_attempts={} auth_required={}",
        bind_addr,
        data_dir.display(),
        state.oracle_concurrency,
        policy.limits.max_final_time,
        policy.limits.max_inputs,
        policy.daily_max_attempts,
        state.auth_required()
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(json_config(json_limit))
            .app_data(web::PayloadConfig::new(json_limit))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as awtest, App};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use torus_core::{daily_seed, Difficulty, ReplayProof};

    const DAILY: &str = "daily-2026-10-16";

    fn test_state(score_key: Option<&str>) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::open(dir.path()).unwrap();
        let state = AppState::new(
            store,
            2,
            ServerPolicy::default(),
            score_key.map(str::to_string),
        );
        (state, dir)
    }

    macro_rules! test_app {
        ($state:expr) => {
            awtest::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .app_data(json_config(DEFAULT_JSON_LIMIT_BYTES))
                    .configure(routes),
            )
            .await
        };
    }

    fn honest_proof(seed: u32) -> ReplayProof {
        host::run_bot("leveler", seed, Difficulty::Normal, 500_000)
            .unwrap()
            .proof
    }

    fn submission(proof: &ReplayProof, client: &str, challenge: Option<&str>) -> Value {
        json!({
            "entry": {
                "user": "  tester  ",
                "score": proof.final_score,
                "level": proof.final_level,
                "date": "2026-10-16T12:00:00Z",
                "skillUsage": [{ "name": "shovel", "hotkey": "s" }],
            },
            "client_uuid": client,
            "challenge_id": challenge,
            "proof": proof,
        })
    }

    const CLIENT: &str = "6f1c1a56-7d1e-4a43-9a59-0f6f3f1e2b11";

    #[actix_web::test]
    async fn health_reports_policy() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let req = awtest::TestRequest::get().uri("/health").to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["max_inputs"], 20_000);
        assert_eq!(body["daily_max_attempts"], 3);
        assert_eq!(body["stored_scores"], 0);
        assert_eq!(body["auth_required"], false);
    }

    #[actix_web::test]
    async fn verify_returns_the_oracle_verdict() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let proof = honest_proof(12_345);

        let req = awtest::TestRequest::post()
            .uri("/api/verify")
            .set_json(&proof)
            .to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["verification"]["ok"], true);
        assert_eq!(body["verification"]["actual"]["gameOn"], false);

        let mut tampered = proof.clone();
        tampered.final_score += 10;
        let req = awtest::TestRequest::post()
            .uri("/api/verify")
            .set_json(&tampered)
            .to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["verification"]["ok"], false);
        assert!(body["verification"]["reason"]
            .as_str()
            .unwrap_or_default()
            .contains("mismatch"));
    }

    #[actix_web::test]
    async fn verify_rejects_undecodable_proofs() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);

        for payload in ["", "{not json", r#"{"version":1}"#] {
            let req = awtest::TestRequest::post()
                .uri("/api/verify")
                .set_payload(payload)
                .to_request();
            let resp = awtest::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{payload}");
        }

        let req = awtest::TestRequest::post()
            .uri("/api/verify")
            .set_payload(
                r#"{"version":1,"difficulty":1,"seed":1,"finalTime":5,"finalScore":0,
                    "finalLevel":0,"inputs":[{"time":1,"move":"jump"}]}"#,
            )
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "invalid_proof");
    }

    #[actix_web::test]
    async fn accepted_scores_are_listed_and_only_improve() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let proof = honest_proof(12_345);

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&proof, CLIENT, None))
            .to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["board"], "global");
        assert_eq!(body["outcome"], "inserted");
        assert!(body.get("attempts_used").is_none());

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&proof, CLIENT, None))
            .to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["outcome"], "kept");

        let req = awtest::TestRequest::get().uri("/api/scores?limit=500").to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["user"], "tester");
        assert_eq!(entries[0]["score"], proof.final_score);
        assert_eq!(entries[0]["skillUsage"][0]["name"], "shovel");
    }

    #[actix_web::test]
    async fn forged_scores_are_rejected_and_not_stored() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let mut forged = honest_proof(12_345);
        forged.final_score += 10;

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&forged, CLIENT, None))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "replay_rejected");
        assert_eq!(body["verification"]["ok"], false);
        assert_eq!(state.scores.count().unwrap(), 0);
    }

    #[actix_web::test]
    async fn entry_must_match_the_proof_claim() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let proof = honest_proof(12_345);
        let mut body = submission(&proof, CLIENT, None);
        body["entry"]["score"] = json!(proof.final_score + 1);

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(body)
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "claim_mismatch");
    }

    #[actix_web::test]
    async fn daily_runs_need_the_challenge_seed_and_spend_attempts() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);

        let off_seed = honest_proof(12_345);
        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&off_seed, CLIENT, Some(DAILY)))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "wrong_seed");

        let proof = honest_proof(daily_seed(DAILY));
        for used in 1..=3 {
            let req = awtest::TestRequest::post()
                .uri("/api/scores")
                .set_json(submission(&proof, CLIENT, Some(DAILY)))
                .to_request();
            let body: Value = awtest::call_and_read_body_json(&app, req).await;
            assert_eq!(body["success"], true);
            assert_eq!(body["board"], DAILY);
            assert_eq!(body["attempts_used"], used);
            assert_eq!(body["attempts_max"], 3);
        }

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&proof, CLIENT, Some(DAILY)))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = awtest::TestRequest::get()
            .uri(&format!("/api/scores?challenge_id={DAILY}"))
            .to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);

        let req = awtest::TestRequest::get().uri("/api/scores").to_request();
        let body: Value = awtest::call_and_read_body_json(&app, req).await;
        assert!(body["entries"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn rejected_daily_replays_still_use_an_attempt() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);
        let mut forged = honest_proof(daily_seed(DAILY));
        forged.final_level += 1;

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&forged, CLIENT, Some(DAILY)))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let client = CLIENT.parse().unwrap();
        assert_eq!(state.scores.attempts_used(DAILY, client).unwrap(), 1);
        assert_eq!(state.scores.count().unwrap(), 0);
    }

    #[actix_web::test]
    async fn writes_require_the_score_key_when_configured() {
        let (state, _dir) = test_state(Some("secret"));
        let app = test_app!(state);
        let proof = honest_proof(12_345);

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(submission(&proof, CLIENT, None))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = awtest::read_body_json(resp).await;
        assert_eq!(body["error_code"], "unauthorized");

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .insert_header(("x-torus-key", "secret"))
            .set_json(submission(&proof, CLIENT, None))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = awtest::TestRequest::get().uri("/api/scores").to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn malformed_bodies_get_json_errors() {
        let (state, _dir) = test_state(None);
        let app = test_app!(state);

        let req = awtest::TestRequest::post()
            .uri("/api/scores")
            .set_json(json!({ "entry": { "user": "x" } }))
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = awtest::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "invalid_request");

        let req = awtest::TestRequest::get()
            .uri("/api/scores?challenge_id=global")
            .to_request();
        let resp = awtest::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
