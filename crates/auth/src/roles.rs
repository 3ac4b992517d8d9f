use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matricula_core::{Entity, RoleId};

/// Role name used for access decisions.
///
/// Role names are opaque, case-sensitive strings; the catalog is data, not code.
/// The two names below are the ones the system itself depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub const ADMIN_NAME: &'static str = "Admin";
    pub const USER_NAME: &'static str = "User";

    pub const ADMIN: RoleName = RoleName(Cow::Borrowed(Self::ADMIN_NAME));

    /// Default role assigned to every newly created user.
    pub const USER: RoleName = RoleName(Cow::Borrowed(Self::USER_NAME));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named role in the role catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> RoleId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: String,
}

impl NewRole {
    pub fn into_role(self, now: DateTime<Utc>) -> Role {
        Role {
            id: RoleId::new(),
            name: self.name,
            description: self.description,
            created_at: now,
            updated_at: now,
        }
    }
}
