use actix_web::{http::StatusCode, HttpResponse};
use torus_core::VerificationResult;

pub(crate) fn json_error_with_code(
    status: StatusCode,
    message: impl Into<String>,
    error_code: Option<&str>,
) -> HttpResponse {
    let mut body = serde_json::json!({
        "success": false,
        "error": message.into(),
    });
    if let Some(code) = error_code {
        body["error_code"] = serde_json::Value::String(code.to_string());
    }
    HttpResponse::build(status).json(body)
}

/// A replay the oracle refused, with the state it actually reached.
pub(crate) fn replay_rejected(verification: &VerificationResult) -> HttpResponse {
    HttpResponse::UnprocessableEntity().json(serde_json::json!({
        "success": false,
        "error": verification.reason.as_deref().unwrap_or("replay rejected"),
        "error_code": "replay_rejected",
        "verification": verification,
    }))
}
