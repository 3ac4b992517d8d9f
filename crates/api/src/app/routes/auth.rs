//! Public authentication endpoints.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use matricula_auth::{Credentials, NewAccount};

use crate::app::dto::{AccessToken, TokenValidity};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/validate", get(validate))
}

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<Credentials>,
) -> axum::response::Response {
    match services.auth.sign_in(&body).await {
        Ok(access_token) => (StatusCode::OK, Json(AccessToken { access_token })).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewAccount>,
) -> axum::response::Response {
    match services.auth.sign_up(body).await {
        Ok(access_token) => {
            (StatusCode::CREATED, Json(AccessToken { access_token })).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /auth/validate
pub async fn validate(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(raw) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing token");
    };

    let validate_token = services.auth.validate_token(strip_bearer(raw));
    (StatusCode::OK, Json(TokenValidity { validate_token })).into_response()
}

/// Drop a leading `Bearer ` in any letter case.
fn strip_bearer(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => raw[7..].trim_start(),
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_case_insensitive() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("bearer abc"), "abc");
        assert_eq!(strip_bearer("BEARER  abc"), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("Bear"), "Bear");
    }
}
