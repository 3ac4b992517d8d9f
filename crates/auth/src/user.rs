//! User accounts (identity store records).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matricula_core::{Entity, RoleId, UserId};

/// A stored user account.
///
/// `role_id` is a weak reference: deleting the role nulls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Unique, compared exactly as stored.
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub role_id: Option<RoleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

impl User {
    /// Public view of the account (no password hash).
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
            role_id: self.role_id,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, changes: UserChanges, now: DateTime<Utc>) {
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            self.password_hash = password_hash;
        }
        if let Some(role_id) = changes.role_id {
            self.role_id = Some(role_id);
        }
        self.updated_at = now;
    }
}

/// Input for account creation. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<RoleId>,
}

impl NewUser {
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: UserId::new(),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password_hash,
            is_active: true,
            role_id: self.role_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a user account; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_active: bool,
    pub role_id: Option<RoleId>,
}

/// Sign-up / account creation input carrying a plaintext password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl NewAccount {
    pub fn with_password_hash(self, password_hash: String) -> NewUser {
        NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
            role_id: None,
        }
    }
}

impl core::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewAccount")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial account update; a supplied password is plaintext and gets hashed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<RoleId>,
}

impl core::fmt::Debug for AccountChanges {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountChanges")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("role_id", &self.role_id)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        NewUser {
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "hash".to_string(),
            role_id: None,
        }
        .into_user(Utc::now())
    }

    #[test]
    fn new_users_are_active() {
        assert!(sample().is_active);
    }

    #[test]
    fn apply_only_touches_supplied_fields() {
        let mut user = sample();
        let role = RoleId::new();
        user.apply(
            UserChanges {
                last_name: Some("Soto".to_string()),
                role_id: Some(role),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.last_name, "Soto");
        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.role_id, Some(role));
    }

    #[test]
    fn debug_output_redacts_passwords() {
        let account = NewAccount {
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            email: "ana@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{account:?}").contains("hunter2"));

        let creds = Credentials {
            email: "ana@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn profile_omits_password_hash() {
        let json = serde_json::to_value(sample().profile()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "ana@example.com");
    }
}
