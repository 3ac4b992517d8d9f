//! Service wiring: picks a storage backend and assembles the services the
//! handlers use.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use matricula_auth::{BcryptPasswordHasher, Hs256TokenService, PasswordHasher, TokenService};
use matricula_core::DomainError;
use matricula_infra::{
    AppConfig, AuthService, DatabaseConfig, EnrollmentAggregateStore, EnrollmentRegistry,
    InMemoryStore, PostgresStore, RoleService, StoreError, UserService,
};
use matricula_infra::store::{RoleStore, UserStore};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("seeding default roles failed: {0}")]
    Seed(#[from] DomainError),
}

#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub users: UserService,
    pub roles: RoleService,
    pub enrollments: Arc<dyn EnrollmentRegistry>,
    pub tokens: Arc<dyn TokenService>,
}

impl AppServices {
    /// Services over a fresh in-memory store.
    pub fn in_memory(jwt_secret: &str, bcrypt_cost: u32) -> Self {
        let store = InMemoryStore::new();
        Self::assemble(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(EnrollmentAggregateStore::new(store)),
            jwt_secret,
            bcrypt_cost,
        )
    }

    /// Services over PostgreSQL; applies the schema first.
    pub async fn postgres(
        db: &DatabaseConfig,
        jwt_secret: &str,
        bcrypt_cost: u32,
    ) -> Result<Self, BootstrapError> {
        let store = PostgresStore::connect(db.connect_options()).await?;
        store.migrate().await?;
        Ok(Self::assemble(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(EnrollmentAggregateStore::new(store)),
            jwt_secret,
            bcrypt_cost,
        ))
    }

    fn assemble(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        enrollments: Arc<dyn EnrollmentRegistry>,
        jwt_secret: &str,
        bcrypt_cost: u32,
    ) -> Self {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptPasswordHasher::with_cost(bcrypt_cost));
        let tokens: Arc<dyn TokenService> = Arc::new(Hs256TokenService::new(jwt_secret));

        let user_service = UserService::new(users, roles.clone(), hasher.clone());
        let auth = AuthService::new(user_service.clone(), roles.clone(), tokens.clone(), hasher);

        Self {
            auth,
            users: user_service,
            roles: RoleService::new(roles),
            enrollments,
            tokens,
        }
    }
}

/// Build services for `config`, seeding the default roles.
pub async fn build_services(
    config: &AppConfig,
    jwt_secret: &str,
) -> Result<AppServices, BootstrapError> {
    let services = match &config.database {
        Some(db) => {
            info!(database = ?db, "using PostgreSQL store");
            AppServices::postgres(db, jwt_secret, config.bcrypt_cost).await?
        }
        None => {
            info!("DB_NAME not set; using in-memory store");
            AppServices::in_memory(jwt_secret, config.bcrypt_cost)
        }
    };
    services.roles.seed_defaults().await?;
    Ok(services)
}
