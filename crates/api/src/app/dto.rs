use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidity {
    pub validate_token: bool,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

// -------------------------
// Mapping helpers
// -------------------------

/// Parse a UUID path segment; a malformed value is a 400.
pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, axum::response::Response> {
    Uuid::parse_str(raw).map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            format!("invalid {what} id '{raw}'"),
        )
    })
}
