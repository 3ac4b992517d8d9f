//! Infrastructure layer: storage backends, configuration and the services
//! that sit between the HTTP boundary and the stores.

pub mod config;
pub mod error;
pub mod sequence;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError, DatabaseConfig};
pub use error::StoreError;
pub use services::{
    AuthService, EnrollmentAggregateStore, EnrollmentRegistry, RoleService, UserService,
};
pub use store::{InMemoryStore, PostgresStore};
