use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use matricula_auth::{NewRole, Role, RoleName};
use matricula_core::{DomainError, DomainResult, RoleId};

use crate::store::RoleStore;

/// Role catalog operations.
#[derive(Clone)]
pub struct RoleService {
    roles: Arc<dyn RoleStore>,
}

impl RoleService {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    pub async fn create(&self, new_role: NewRole) -> DomainResult<Role> {
        info!(name = %new_role.name, "creating role");
        match self.roles.insert_role(new_role.into_role(Utc::now())).await {
            Ok(role) => {
                info!(role_id = %role.id, "role created");
                Ok(role)
            }
            Err(e) if e.is_unique_violation() => {
                warn!(error = %e, "duplicate role name");
                Err(DomainError::conflict("role name is already taken"))
            }
            Err(e) => Err(DomainError::bad_request(e.to_string())),
        }
    }

    pub async fn list(&self) -> DomainResult<Vec<Role>> {
        self.roles
            .list_roles()
            .await
            .map_err(|e| DomainError::bad_request(e.to_string()))
    }

    pub async fn get_by_id(&self, id: RoleId) -> DomainResult<Role> {
        match self.roles.find_role_by_id(id).await {
            Ok(Some(role)) => Ok(role),
            Ok(None) => {
                warn!(role_id = %id, "role not found");
                Err(DomainError::not_found(format!("role with id {id} not found")))
            }
            Err(e) => Err(DomainError::bad_request(e.to_string())),
        }
    }

    pub async fn get_by_name(&self, name: &str) -> DomainResult<Option<Role>> {
        self.roles
            .find_role_by_name(name)
            .await
            .map_err(|e| DomainError::bad_request(e.to_string()))
    }

    /// Make sure the `Admin` and `User` roles exist. Safe to call on every start.
    pub async fn seed_defaults(&self) -> DomainResult<()> {
        let defaults = [
            (RoleName::ADMIN_NAME, "Full access, including updates and deletes"),
            (RoleName::USER_NAME, "Default role for registered accounts"),
        ];
        for (name, description) in defaults {
            if self.get_by_name(name).await?.is_some() {
                continue;
            }
            let seeded = self
                .roles
                .insert_role(
                    NewRole {
                        name: name.to_string(),
                        description: description.to_string(),
                    }
                    .into_role(Utc::now()),
                )
                .await;
            match seeded {
                Ok(role) => info!(role_id = %role.id, name, "seeded role"),
                // Another instance seeded it first.
                Err(e) if e.is_unique_violation() => {}
                Err(e) => return Err(DomainError::bad_request(e.to_string())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> RoleService {
        RoleService::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn seeding_twice_keeps_two_roles() {
        let roles = service();
        roles.seed_defaults().await.unwrap();
        roles.seed_defaults().await.unwrap();

        let names: Vec<String> = roles.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Admin", "User"]);
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let roles = service();
        let new_role = NewRole {
            name: "Teacher".to_string(),
            description: "class teachers".to_string(),
        };
        roles.create(new_role.clone()).await.unwrap();
        assert!(matches!(
            roles.create(new_role).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let err = service().get_by_id(RoleId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
