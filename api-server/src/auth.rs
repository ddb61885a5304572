use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;

use crate::response::json_error_with_code;

/// Header carrying the score-write key. `Authorization: Bearer <key>` works too.
pub(crate) const SCORE_KEY_HEADER: &str = "x-torus-key";

/// The key a client presented, from either header form.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    };

    if let Some(key) = header_value(SCORE_KEY_HEADER) {
        return Some(key);
    }
    let (scheme, key) = header_value("authorization")?.split_once(' ')?;
    let key = key.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !key.is_empty()).then_some(key)
}

/// Score writes need the configured key; an open server takes any submission.
pub(crate) fn may_submit_scores(headers: &HeaderMap, score_key: Option<&str>) -> bool {
    match score_key {
        None => true,
        Some(expected) => presented_key(headers) == Some(expected),
    }
}

pub(crate) fn missing_score_key() -> HttpResponse {
    json_error_with_code(
        StatusCode::UNAUTHORIZED,
        format!("score submissions need a valid {SCORE_KEY_HEADER} or bearer key"),
        Some("unauthorized"),
    )
}
