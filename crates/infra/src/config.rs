//! Configuration loading and representation.
//!
//! Everything comes from the process environment; `from_lookup` exists so the
//! parsing rules can be exercised without touching real env vars.

use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
}

impl DatabaseConfig {
    /// Connection options built field by field, so credentials are never
    /// reparsed as part of a URL.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.name)
    }
}

impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// HS256 signing secret. `None` when `JWT_SECRET_KEY` is unset; the
    /// binary decides whether to fall back.
    pub jwt_secret: Option<String>,

    /// `None` selects the in-memory store.
    pub database: Option<DatabaseConfig>,

    pub bind_addr: String,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get("DB_NAME") {
            Some(name) => Some(DatabaseConfig {
                host: get("HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or("DB_PORT", get("DB_PORT"), DEFAULT_DB_PORT)?,
                username: get("DB_USERNAME").unwrap_or_else(|| "postgres".to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                name,
            }),
            None => None,
        };

        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), DEFAULT_BCRYPT_COST)?;
        // bcrypt accepts costs 4..=31.
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".to_string(),
            });
        }

        Ok(Self {
            jwt_secret: get("JWT_SECRET_KEY"),
            database,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            bcrypt_cost,
        })
    }

    /// The signing secret, or `ConfigError::Missing` when unset.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::Missing("JWT_SECRET_KEY"))
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("bind_addr", &self.bind_addr)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}
