use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use matricula_auth::{AccountChanges, NewAccount, NewUser, PasswordHasher, RoleName, User, UserChanges};
use matricula_core::{DomainError, DomainResult, UserId};

use crate::error::StoreError;
use crate::store::{RoleStore, UserStore};

/// Account management: the user-creation path plus lookup and update.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            roles,
            hasher,
        }
    }

    /// Create an account whose password is already hashed, assigning the
    /// default `User` role.
    pub async fn create(&self, new_user: NewUser) -> DomainResult<User> {
        info!(email = %new_user.email, "creating user");

        let role = self
            .roles
            .find_role_by_name(RoleName::USER_NAME)
            .await
            .map_err(|e| DomainError::bad_request(e.to_string()))?
            .ok_or_else(|| {
                error!("default role missing from the role catalog");
                DomainError::not_found(format!("role {} not found", RoleName::USER_NAME))
            })?;

        let user = NewUser {
            role_id: Some(role.id),
            ..new_user
        }
        .into_user(Utc::now());

        match self.users.insert_user(user).await {
            Ok(user) => {
                info!(user_id = %user.id, "user created");
                Ok(user)
            }
            Err(e) => Err(translate_write_error(e)),
        }
    }

    /// Hash the plaintext password, then run [`UserService::create`].
    pub async fn create_with_password(&self, account: NewAccount) -> DomainResult<User> {
        let hash = self.hash(&account.password)?;
        self.create(account.with_password_hash(hash)).await
    }

    pub async fn find_by_email(&self, email: &str) -> DomainResult<User> {
        match self.users.find_user_by_email(email).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => {
                warn!(email, "user not found");
                Err(DomainError::not_found(format!(
                    "user with email {email} not found"
                )))
            }
            Err(e) => Err(DomainError::bad_request(e.to_string())),
        }
    }

    pub async fn update(&self, id: UserId, changes: AccountChanges) -> DomainResult<User> {
        info!(user_id = %id, "updating user");

        if let Some(role_id) = changes.role_id {
            let role = self
                .roles
                .find_role_by_id(role_id)
                .await
                .map_err(|e| DomainError::bad_request(e.to_string()))?;
            if role.is_none() {
                warn!(role_id = %role_id, "role not found");
                return Err(DomainError::not_found(format!(
                    "role with id {role_id} not found"
                )));
            }
        }

        let password_hash = changes
            .password
            .as_deref()
            .map(|plain| self.hash(plain))
            .transpose()?;

        let updated = self
            .users
            .update_user(
                id,
                UserChanges {
                    first_name: changes.first_name,
                    last_name: changes.last_name,
                    email: changes.email,
                    password_hash,
                    role_id: changes.role_id,
                },
                Utc::now(),
            )
            .await
            .map_err(translate_write_error)?;

        match updated {
            Some(user) => {
                info!(user_id = %user.id, "user updated");
                Ok(user)
            }
            None => {
                warn!(user_id = %id, "user not found");
                Err(DomainError::not_found(format!("user with id {id} not found")))
            }
        }
    }

    fn hash(&self, plaintext: &str) -> DomainResult<String> {
        self.hasher.hash(plaintext).map_err(|e| {
            error!(error = %e, "password hashing failed");
            DomainError::internal("could not process password")
        })
    }
}

fn translate_write_error(e: StoreError) -> DomainError {
    if e.is_unique_violation() {
        warn!(error = %e, "duplicate email");
        DomainError::conflict("email is already registered")
    } else {
        DomainError::bad_request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matricula_auth::{BcryptPasswordHasher, NewRole};

    use crate::services::RoleService;
    use crate::store::InMemoryStore;

    async fn seeded() -> (UserService, InMemoryStore) {
        let store = InMemoryStore::new();
        RoleService::new(Arc::new(store.clone()))
            .seed_defaults()
            .await
            .unwrap();
        let users = UserService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(BcryptPasswordHasher::with_cost(4)),
        );
        (users, store)
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            email: email.to_string(),
            password: "s3cret!".to_string(),
        }
    }

    #[tokio::test]
    async fn created_users_get_the_user_role() {
        let (users, store) = seeded().await;
        let user = users.create_with_password(account("ana@example.com")).await.unwrap();

        let role = store.find_role_by_name("User").await.unwrap().unwrap();
        assert_eq!(user.role_id, Some(role.id));
        assert_ne!(user.password_hash, "s3cret!");
    }

    #[tokio::test]
    async fn missing_default_role_is_not_found() {
        let store = InMemoryStore::new();
        let users = UserService::new(
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(BcryptPasswordHasher::with_cost(4)),
        );
        let err = users.create_with_password(account("ana@example.com")).await.unwrap_err();
        assert_eq!(err, DomainError::not_found("role User not found"));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (users, _) = seeded().await;
        users.create_with_password(account("ana@example.com")).await.unwrap();
        let err = users
            .create_with_password(account("ana@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_hashes_new_password_and_checks_role() {
        let (users, store) = seeded().await;
        let user = users.create_with_password(account("ana@example.com")).await.unwrap();

        let err = users
            .update(
                user.id,
                AccountChanges {
                    role_id: Some(matricula_core::RoleId::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        let admin = store
            .insert_role(
                NewRole {
                    name: "Coordinator".to_string(),
                    description: String::new(),
                }
                .into_role(Utc::now()),
            )
            .await
            .unwrap();
        let updated = users
            .update(
                user.id,
                AccountChanges {
                    password: Some("n3w-pass".to_string()),
                    role_id: Some(admin.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role_id, Some(admin.id));
        assert_eq!(updated.email, "ana@example.com");
        assert!(BcryptPasswordHasher::with_cost(4).verify("n3w-pass", &updated.password_hash));
    }

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let (users, _) = seeded().await;
        let err = users
            .update(UserId::new(), AccountChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_by_email_reports_the_address() {
        let (users, _) = seeded().await;
        let err = users.find_by_email("nobody@example.com").await.unwrap_err();
        assert_eq!(
            err,
            DomainError::not_found("user with email nobody@example.com not found")
        );
    }
}
