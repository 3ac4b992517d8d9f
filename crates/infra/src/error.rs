//! Persistence failures shared by every store backend.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (restrict violation) | `23001` | `RestrictViolation` |
//! | Database (other) | Any other | `Database` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Database` |

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    #[error("delete restricted by dependent rows: {0}")]
    RestrictViolation(String),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        StoreError::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }

    pub(crate) fn poisoned() -> Self {
        StoreError::Database("lock poisoned".to_string())
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            let msg = format!("{} in {}: {}", constraint, operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation { constraint },
                Some("23503") => StoreError::ForeignKeyViolation(msg),
                Some("23001") => StoreError::RestrictViolation(msg),
                _ => StoreError::Database(format!("{} failed: {}", operation, db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(operation.to_string()),
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Database(format!("sqlx error in {}: {}", operation, other)),
    }
}
