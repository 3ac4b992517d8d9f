//! Password hashing with a fixed contract: `hash` then `verify`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Opaque password hashing primitive.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError>;

    /// Compare a plaintext password against a stored hash.
    ///
    /// A malformed stored hash is treated as a mismatch.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// bcrypt-backed hasher.
#[derive(Debug, Clone, Copy)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub const DEFAULT_COST: u32 = 10;

    pub fn new() -> Self {
        Self::with_cost(Self::DEFAULT_COST)
    }

    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| PasswordError::Hash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }
}
