use thiserror::Error;

use matricula_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown {kind} value '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid date '{0}': expected an ISO-8601 date")]
    InvalidDate(String),
}

impl From<ModelError> for DomainError {
    fn from(err: ModelError) -> Self {
        DomainError::bad_request(err.to_string())
    }
}
