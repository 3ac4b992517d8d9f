use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use matricula_core::UserId;

/// Lifetime of an issued identity token.
pub const TOKEN_TTL_HOURS: i64 = 12;

/// Tolerated clock skew between the issuing and the verifying host when
/// checking `iat`. Expiry gets no leeway.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 60;

/// Identity token claims (transport-agnostic).
///
/// `role` is empty when the user has no role assigned; the authorizer treats an
/// empty role as "no role" and denies every role-restricted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: UserId,

    /// Display name (the user's first name).
    pub username: String,

    pub email: String,

    /// Role name, matched verbatim against per-operation allow-lists.
    #[serde(default)]
    pub role: String,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

impl Claims {
    /// Build claims issued at `issued_at` with the fixed token lifetime.
    pub fn new(
        sub: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        role: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub,
            username: username.into(),
            email: email.into(),
            role: role.unwrap_or_default().to_string(),
            iat: issued_at,
            exp: issued_at + Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    pub fn has_role(&self) -> bool {
        !self.role.is_empty()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature verification happens before this, in the token service.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    if now + Duration::seconds(ISSUED_AT_LEEWAY_SECS) < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    Ok(())
}
