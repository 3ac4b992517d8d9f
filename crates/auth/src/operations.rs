//! Per-operation role allow-lists.
//!
//! Every protected operation declares its permitted roles here, in one table,
//! instead of annotating handlers.

use serde::Serialize;

use crate::authorize::AllowedRoles;
use crate::roles::RoleName;

const ADMIN_ONLY: AllowedRoles = AllowedRoles::new(&[RoleName::ADMIN_NAME]);
const ADMIN_OR_USER: AllowedRoles = AllowedRoles::new(&[RoleName::ADMIN_NAME, RoleName::USER_NAME]);

/// Operations guarded by the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    EnrollmentCreate,
    EnrollmentList,
    EnrollmentRead,
    EnrollmentUpdate,
    EnrollmentDelete,
    RoleCreate,
    RoleList,
    RoleRead,
    UserCreate,
    UserRead,
    UserUpdate,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::EnrollmentCreate,
        Operation::EnrollmentList,
        Operation::EnrollmentRead,
        Operation::EnrollmentUpdate,
        Operation::EnrollmentDelete,
        Operation::RoleCreate,
        Operation::RoleList,
        Operation::RoleRead,
        Operation::UserCreate,
        Operation::UserRead,
        Operation::UserUpdate,
    ];

    pub fn allowed_roles(self) -> AllowedRoles {
        match self {
            Operation::EnrollmentCreate
            | Operation::EnrollmentList
            | Operation::EnrollmentRead => ADMIN_OR_USER,
            Operation::EnrollmentUpdate | Operation::EnrollmentDelete => ADMIN_ONLY,
            Operation::RoleCreate | Operation::RoleList => ADMIN_ONLY,
            Operation::RoleRead => ADMIN_OR_USER,
            Operation::UserCreate => ADMIN_ONLY,
            Operation::UserRead | Operation::UserUpdate => ADMIN_OR_USER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::EnrollmentCreate => "enrollments.create",
            Operation::EnrollmentList => "enrollments.list",
            Operation::EnrollmentRead => "enrollments.read",
            Operation::EnrollmentUpdate => "enrollments.update",
            Operation::EnrollmentDelete => "enrollments.delete",
            Operation::RoleCreate => "roles.create",
            Operation::RoleList => "roles.list",
            Operation::RoleRead => "roles.read",
            Operation::UserCreate => "users.create",
            Operation::UserRead => "users.read",
            Operation::UserUpdate => "users.update",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_is_role_restricted() {
        for op in Operation::ALL {
            assert!(!op.allowed_roles().is_open(), "{op} must declare roles");
        }
    }

    #[test]
    fn writes_on_enrollments_are_admin_only() {
        for op in [Operation::EnrollmentUpdate, Operation::EnrollmentDelete] {
            let roles = op.allowed_roles();
            assert!(roles.permits("Admin"));
            assert!(!roles.permits("User"));
        }
    }

    #[test]
    fn reads_on_enrollments_allow_users() {
        for op in [
            Operation::EnrollmentCreate,
            Operation::EnrollmentList,
            Operation::EnrollmentRead,
        ] {
            assert!(op.allowed_roles().permits("User"));
        }
    }
}
