//! `matricula-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it owns the
//! identity entities, token claims, the token service, password hashing and
//! the role-based access decision.

pub mod authorize;
pub mod claims;
pub mod operations;
pub mod password;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AccessDecision, AllowedRoles, authorize, explain};
pub use claims::{Claims, ISSUED_AT_LEEWAY_SECS, TOKEN_TTL_HOURS, TokenError, validate_claims};
pub use operations::Operation;
pub use password::{BcryptPasswordHasher, PasswordError, PasswordHasher};
pub use roles::{NewRole, Role, RoleName};
pub use token::{Hs256TokenService, TokenService};
pub use user::{AccountChanges, Credentials, NewAccount, NewUser, User, UserChanges, UserProfile};
