//! Storage boundary.
//!
//! Two backends implement every trait here: [`InMemoryStore`] (tests/dev) and
//! [`PostgresStore`]. Both encode the same referential rules explicitly:
//!
//! | Deleted row | Dependent rows | Rule |
//! |-------------|----------------|------|
//! | Student | Enrollments | restrict |
//! | Student | Parents, FamilyInformation, AuthorizedPerson, Representative | cascade |
//! | User | `enrollments.registered_by_user_id` | set null |
//! | Role | `users.role_id` | set null |

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use matricula_auth::{Role, User, UserChanges};
use matricula_core::{EnrollmentId, RoleId, StudentId, UserId};
use matricula_enrollments::{
    AuthorizedPerson, Enrollment, EnrollmentChanges, EnrollmentDetails, EnrollmentRef,
    FamilyInformation, Parent, Representative, Student,
};

use crate::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryStore, InMemoryTx, RowCounts};
pub use postgres::{PostgresStore, PostgresTx};

/// Unique constraint names, shared by both backends.
pub mod constraints {
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const ROLES_NAME: &str = "roles_name_key";
    pub const STUDENTS_RUT: &str = "students_rut_key";
    pub const FAMILY_INFORMATION_STUDENT: &str = "family_information_student_id_key";
    pub const AUTHORIZED_PERSONS_STUDENT: &str = "authorized_persons_student_id_key";
    pub const REPRESENTATIVES_STUDENT: &str = "representatives_student_id_key";
    pub const ENROLLMENTS_NUMBER: &str = "enrollments_enrollment_number_key";
    pub const ENROLLMENTS_STUDENT_YEAR: &str = "enrollments_student_id_academic_year_key";
}

/// User records, looked up by email or id.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Apply a partial update. `Ok(None)` when the user does not exist.
    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Delete a user, nulling every enrollment's reference to it.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
}

/// Role catalog.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn insert_role(&self, role: Role) -> Result<Role, StoreError>;

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    /// Delete a role, nulling every user's reference to it.
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;
}

/// Transactional store for the enrollment aggregate.
#[async_trait]
pub trait EnrollmentDb: Send + Sync + 'static {
    type Tx: EnrollmentTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Enrollment plus its student and all four child relations.
    async fn find_details(
        &self,
        target: &EnrollmentRef,
    ) -> Result<Option<EnrollmentDetails>, StoreError>;

    /// Enrollment row only.
    async fn find_enrollment(&self, target: &EnrollmentRef)
    -> Result<Option<Enrollment>, StoreError>;

    /// Every enrollment, eagerly loaded, most recently created first.
    async fn list_details(&self) -> Result<Vec<EnrollmentDetails>, StoreError>;

    /// Persist only the supplied fields. `Ok(None)` when the row is gone.
    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        changes: &EnrollmentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, StoreError>;

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError>;

    /// Restricted while enrollments reference the student; otherwise cascades
    /// to the student's owned child records.
    async fn delete_student(&self, id: StudentId) -> Result<bool, StoreError>;
}

/// An open write transaction on the aggregate tables.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait EnrollmentTx: Send {
    async fn student_exists_by_rut(&mut self, rut: &str) -> Result<bool, StoreError>;

    async fn insert_student(&mut self, student: &Student) -> Result<(), StoreError>;

    /// Insert every parent row of one student as a single batch.
    async fn insert_parents(&mut self, parents: &[Parent]) -> Result<(), StoreError>;

    async fn insert_family_information(
        &mut self,
        row: &FamilyInformation,
    ) -> Result<(), StoreError>;

    async fn insert_authorized_person(&mut self, row: &AuthorizedPerson)
    -> Result<(), StoreError>;

    async fn insert_representative(&mut self, row: &Representative) -> Result<(), StoreError>;

    /// Enrollments for the year visible to this transaction.
    async fn count_enrollments_for_year(&mut self, academic_year: i32)
    -> Result<u64, StoreError>;

    async fn insert_enrollment(&mut self, row: &Enrollment) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
