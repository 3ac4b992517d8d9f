use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use matricula_auth::{Claims, Credentials, NewAccount, PasswordHasher, TokenService};
use matricula_core::{DomainError, DomainResult};

use crate::services::UserService;
use crate::store::RoleStore;

/// Sign-in, sign-up and token validation.
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    roles: Arc<dyn RoleStore>,
    tokens: Arc<dyn TokenService>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AuthService {
    pub fn new(
        users: UserService,
        roles: Arc<dyn RoleStore>,
        tokens: Arc<dyn TokenService>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            roles,
            tokens,
            hasher,
        }
    }

    /// Verify credentials and issue a token naming the user's role.
    pub async fn sign_in(&self, credentials: &Credentials) -> DomainResult<String> {
        info!(email = %credentials.email, "sign-in attempt");
        let user = self.users.find_by_email(&credentials.email).await?;

        if !self
            .hasher
            .verify(&credentials.password, &user.password_hash)
        {
            warn!(user_id = %user.id, "invalid credentials");
            return Err(DomainError::unauthorized("invalid credentials"));
        }

        // A user without a role still signs in; its token carries an empty role.
        let role = match user.role_id {
            Some(role_id) => self
                .roles
                .find_role_by_id(role_id)
                .await
                .map_err(|e| DomainError::bad_request(e.to_string()))?,
            None => None,
        };

        let claims = Claims::new(
            user.id,
            user.first_name.clone(),
            user.email.clone(),
            role.as_ref().map(|r| r.name.as_str()),
            Utc::now(),
        );
        let token = self.tokens.issue(&claims).map_err(|e| {
            error!(error = %e, "token issuance failed");
            DomainError::internal("could not issue token")
        })?;

        info!(user_id = %user.id, role = %claims.role, "signed in");
        Ok(token)
    }

    /// Register an account with the default role, then sign it in.
    pub async fn sign_up(&self, account: NewAccount) -> DomainResult<String> {
        info!(email = %account.email, "sign-up attempt");
        let hash = self.hasher.hash(&account.password).map_err(|e| {
            error!(error = %e, "password hashing failed");
            DomainError::internal("error registering user")
        })?;

        let credentials = Credentials {
            email: account.email.clone(),
            password: account.password.clone(),
        };

        match self.users.create(account.with_password_hash(hash)).await {
            Ok(user) => info!(user_id = %user.id, "user registered"),
            Err(
                e @ (DomainError::Conflict(_)
                | DomainError::BadRequest(_)
                | DomainError::NotFound(_)),
            ) => return Err(e),
            Err(e) => {
                error!(error = %e, "registration failed");
                return Err(DomainError::internal("error registering user"));
            }
        }

        self.sign_in(&credentials).await
    }

    /// `true` only for a well-formed, correctly signed, unexpired token.
    pub fn validate_token(&self, token: &str) -> bool {
        self.tokens.verify(token, Utc::now()).is_ok()
    }

    pub fn verify(&self, token: &str) -> DomainResult<Claims> {
        self.tokens
            .verify(token, Utc::now())
            .map_err(|_| DomainError::unauthorized("invalid token"))
    }
}
