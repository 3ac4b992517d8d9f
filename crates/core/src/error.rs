//! Domain error model.

use thiserror::Error;

/// Result type used across the domain and service layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Client-facing error taxonomy.
///
/// Services raise these directly for recognized domain outcomes and re-raise
/// them unchanged up to the HTTP boundary. Storage failures are translated into
/// one of these variants by the service that owns the operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing/invalid/expired token, or bad credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the principal's role is not permitted.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (duplicate rut, email, enrollment...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other persistence failure, carrying the underlying message.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unexpected failure that must not leak internal detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::BadRequest(m)
            | Self::Internal(m) => m,
        }
    }

    /// Stable machine-readable code for the category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}
