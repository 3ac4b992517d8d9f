//! PostgreSQL backend.
//!
//! Unique and foreign-key rules are enforced by the schema (`schema.sql`);
//! violations come back through [`map_sqlx_error`] carrying the constraint
//! name. The restrict rule on student deletion is checked explicitly so it
//! surfaces as `RestrictViolation` rather than a generic FK error.
//!
//! Closed vocabularies are stored as TEXT using their wire spellings and
//! parsed back on read; an unknown spelling is a decode error.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use matricula_auth::{Role, User, UserChanges};
use matricula_core::{
    AuthorizedPersonId, EnrollmentId, FamilyInformationId, ParentId, RepresentativeId, RoleId,
    StudentId, UserId,
};
use matricula_enrollments::{
    AuthorizedPerson, Enrollment, EnrollmentChanges, EnrollmentDetails, EnrollmentRef,
    FamilyInformation, Household, ModelError, Parent, Representative, Student, StudentDetails,
};

use super::{EnrollmentDb, EnrollmentTx, RoleStore, UserStore};
use crate::error::{StoreError, map_sqlx_error};

const SCHEMA: &str = include_str!("schema.sql");

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, is_active, role_id, created_at, updated_at";

const ROLE_COLUMNS: &str = "id, name, description, created_at, updated_at";

const STUDENT_COLUMNS: &str = "id, names, last_names, rut, birth_date, nationality, \
     current_address, commune, gender, prevision, medical_conditions, allergies, medications, \
     special_needs, created_at, updated_at";

const PARENT_COLUMNS: &str = "id, student_id, parent_type, names, last_names, rut, nationality, \
     occupation, education_level, workplace, phone, email, created_at, updated_at";

const HOUSEHOLD_COLUMNS: &str = "id, student_id, household_head, household_head_other, \
     monthly_income, social_program_chile_solidario, social_program_puente, social_program_suf, \
     social_program_other, housing_type, housing_structure, has_drinking_water, has_electricity, \
     bedrooms_count, residents_count, cas_index, created_at, updated_at";

const REPRESENTATIVE_COLUMNS: &str = "id, student_id, names, last_names, rut, relationship, \
     address, commune, phone, mobile_phone, email, occupation, education_level, workplace, \
     workplace_phone, workplace_address, created_at, updated_at";

const ENROLLMENT_COLUMNS: &str = "id, enrollment_number, student_id, academic_year, grade_level, \
     requires_junaeb, requires_transport, requires_extended_hours, junaeb_priority, \
     transport_priority, extended_hours_priority, observations, registered_by_user_id, status, \
     enrollment_date, created_at, updated_at";

/// Postgres-backed store for users, roles and the enrollment aggregate.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool with the given options.
    pub async fn connect(options: PgConnectOptions) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create any missing tables, constraints and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        debug!("schema applied");
        Ok(())
    }

    /// Load the student side of each enrollment in one query per table.
    async fn attach_details(
        &self,
        enrollments: Vec<Enrollment>,
    ) -> Result<Vec<EnrollmentDetails>, StoreError> {
        if enrollments.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = enrollments.iter().map(|e| *e.student_id.as_uuid()).collect();

        let students: HashMap<StudentId, Student> = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .try_map(|row: PgRow| decode_student(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_students", e))?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

        let parents: Vec<Parent> = sqlx::query(&format!(
            "SELECT {PARENT_COLUMNS} FROM parents WHERE student_id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(&ids)
        .try_map(|row: PgRow| decode_parent(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_parents", e))?;

        let family: HashMap<StudentId, FamilyInformation> = sqlx::query(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM family_information WHERE student_id = ANY($1)"
        ))
        .bind(&ids)
        .try_map(|row: PgRow| decode_family_information(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_family_information", e))?
        .into_iter()
        .map(|f| (f.student_id, f))
        .collect();

        let authorized: HashMap<StudentId, AuthorizedPerson> = sqlx::query(&format!(
            "SELECT {HOUSEHOLD_COLUMNS} FROM authorized_persons WHERE student_id = ANY($1)"
        ))
        .bind(&ids)
        .try_map(|row: PgRow| decode_authorized_person(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_authorized_persons", e))?
        .into_iter()
        .map(|a| (a.student_id, a))
        .collect();

        let representatives: HashMap<StudentId, Representative> = sqlx::query(&format!(
            "SELECT {REPRESENTATIVE_COLUMNS} FROM representatives WHERE student_id = ANY($1)"
        ))
        .bind(&ids)
        .try_map(|row: PgRow| decode_representative(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_representatives", e))?
        .into_iter()
        .map(|r| (r.student_id, r))
        .collect();

        let mut details = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let sid = enrollment.student_id;
            // The restrict rule keeps the student alive while the enrollment exists.
            let Some(student) = students.get(&sid).cloned() else {
                return Err(StoreError::Database(format!(
                    "enrollment {} references missing student {sid}",
                    enrollment.id
                )));
            };
            details.push(EnrollmentDetails {
                enrollment,
                student: StudentDetails {
                    student,
                    parents: parents
                        .iter()
                        .filter(|p| p.student_id == sid)
                        .cloned()
                        .collect(),
                    family_information: family.get(&sid).cloned(),
                    authorized_person: authorized.get(&sid).cloned(),
                    representative: representatives.get(&sid).cloned(),
                },
            });
        }
        Ok(details)
    }
}

/// Open transaction on a [`PostgresStore`]. Dropping it rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn insert_household(
        &mut self,
        table: &'static str,
        id: Uuid,
        student_id: StudentId,
        household: &Household,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {table} ({HOUSEHOLD_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(student_id.as_uuid())
            .bind(household.household_head.map(|v| v.as_str()))
            .bind(household.household_head_other.as_deref())
            .bind(household.monthly_income.map(|v| v.as_str()))
            .bind(household.social_program_chile_solidario)
            .bind(household.social_program_puente)
            .bind(household.social_program_suf)
            .bind(household.social_program_other.as_deref())
            .bind(household.housing_type.map(|v| v.as_str()))
            .bind(household.housing_structure.as_deref())
            .bind(household.has_drinking_water)
            .bind(household.has_electricity)
            .bind(household.bedrooms_count)
            .bind(household.residents_count)
            .bind(household.cas_index.as_deref())
            .bind(created_at)
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentTx for PostgresTx {
    async fn student_exists_by_rut(&mut self, rut: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM students WHERE rut = $1) AS present")
            .bind(rut)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("student_exists_by_rut", e))?;
        row.try_get("present")
            .map_err(|e| map_sqlx_error("student_exists_by_rut", e))
    }

    async fn insert_student(&mut self, s: &Student) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO students ({STUDENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(s.id.as_uuid())
        .bind(&s.names)
        .bind(&s.last_names)
        .bind(&s.rut)
        .bind(s.birth_date)
        .bind(&s.nationality)
        .bind(&s.current_address)
        .bind(s.commune.as_deref())
        .bind(s.gender.as_str())
        .bind(s.prevision.as_deref())
        .bind(s.medical_conditions.as_deref())
        .bind(s.allergies.as_deref())
        .bind(s.medications.as_deref())
        .bind(s.special_needs.as_deref())
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_student", e))?;
        Ok(())
    }

    async fn insert_parents(&mut self, parents: &[Parent]) -> Result<(), StoreError> {
        if parents.is_empty() {
            return Ok(());
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO parents ({PARENT_COLUMNS}) "));
        qb.push_values(parents, |mut b, p| {
            b.push_bind(*p.id.as_uuid())
                .push_bind(*p.student_id.as_uuid())
                .push_bind(p.parent_type.as_str())
                .push_bind(p.names.as_str())
                .push_bind(p.last_names.as_str())
                .push_bind(p.rut.as_deref())
                .push_bind(p.nationality.as_deref())
                .push_bind(p.occupation.as_deref())
                .push_bind(p.education_level.as_deref())
                .push_bind(p.workplace.as_deref())
                .push_bind(p.phone.as_deref())
                .push_bind(p.email.as_deref())
                .push_bind(p.created_at)
                .push_bind(p.updated_at);
        });
        qb.build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_parents", e))?;
        Ok(())
    }

    async fn insert_family_information(
        &mut self,
        row: &FamilyInformation,
    ) -> Result<(), StoreError> {
        self.insert_household(
            "family_information",
            *row.id.as_uuid(),
            row.student_id,
            &row.household,
            row.created_at,
            row.updated_at,
        )
        .await
    }

    async fn insert_authorized_person(
        &mut self,
        row: &AuthorizedPerson,
    ) -> Result<(), StoreError> {
        self.insert_household(
            "authorized_persons",
            *row.id.as_uuid(),
            row.student_id,
            &row.household,
            row.created_at,
            row.updated_at,
        )
        .await
    }

    async fn insert_representative(&mut self, r: &Representative) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO representatives ({REPRESENTATIVE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(r.id.as_uuid())
        .bind(r.student_id.as_uuid())
        .bind(&r.names)
        .bind(&r.last_names)
        .bind(&r.rut)
        .bind(r.relationship.as_deref())
        .bind(r.address.as_deref())
        .bind(r.commune.as_deref())
        .bind(r.phone.as_deref())
        .bind(r.mobile_phone.as_deref())
        .bind(r.email.as_deref())
        .bind(r.occupation.as_deref())
        .bind(r.education_level.as_deref())
        .bind(r.workplace.as_deref())
        .bind(r.workplace_phone.as_deref())
        .bind(r.workplace_address.as_deref())
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_representative", e))?;
        Ok(())
    }

    async fn count_enrollments_for_year(
        &mut self,
        academic_year: i32,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM enrollments WHERE academic_year = $1")
            .bind(academic_year)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_enrollments_for_year", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_enrollments_for_year", e))?;
        u64::try_from(total)
            .map_err(|_| StoreError::Database(format!("negative enrollment count {total}")))
    }

    async fn insert_enrollment(&mut self, e: &Enrollment) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO enrollments ({ENROLLMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(e.id.as_uuid())
        .bind(&e.enrollment_number)
        .bind(e.student_id.as_uuid())
        .bind(e.academic_year)
        .bind(&e.grade_level)
        .bind(e.requires_junaeb)
        .bind(e.requires_transport)
        .bind(e.requires_extended_hours)
        .bind(e.junaeb_priority.map(|p| p.as_str()))
        .bind(e.transport_priority.map(|p| p.as_str()))
        .bind(e.extended_hours_priority.map(|p| p.as_str()))
        .bind(e.observations.as_deref())
        .bind(e.registered_by_user_id.map(|u| *u.as_uuid()))
        .bind(e.status.as_str())
        .bind(e.enrollment_date)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| map_sqlx_error("insert_enrollment", err))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl EnrollmentDb for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTx { tx })
    }

    #[instrument(skip(self, target), fields(lookup = %target), err)]
    async fn find_details(
        &self,
        target: &EnrollmentRef,
    ) -> Result<Option<EnrollmentDetails>, StoreError> {
        let Some(enrollment) = self.find_enrollment(target).await? else {
            return Ok(None);
        };
        Ok(self.attach_details(vec![enrollment]).await?.pop())
    }

    async fn find_enrollment(
        &self,
        target: &EnrollmentRef,
    ) -> Result<Option<Enrollment>, StoreError> {
        let column = match target {
            EnrollmentRef::ById(_) => "id",
            EnrollmentRef::ByNumber(_) => "enrollment_number",
        };
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE {column} = $1");
        let query = sqlx::query(&sql);
        let query = match target {
            EnrollmentRef::ById(id) => query.bind(*id.as_uuid()),
            EnrollmentRef::ByNumber(number) => query.bind(number.as_str()),
        };
        query
            .try_map(|row: PgRow| decode_enrollment(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_enrollment", e))
    }

    #[instrument(skip(self), err)]
    async fn list_details(&self) -> Result<Vec<EnrollmentDetails>, StoreError> {
        let enrollments = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments ORDER BY created_at DESC, id DESC"
        ))
        .try_map(|row: PgRow| decode_enrollment(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_enrollments", e))?;
        self.attach_details(enrollments).await
    }

    #[instrument(skip(self, id, changes), fields(enrollment_id = %id), err)]
    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        changes: &EnrollmentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE enrollments SET updated_at = ");
        qb.push_bind(now);
        if let Some(year) = changes.academic_year {
            qb.push(", academic_year = ").push_bind(year);
        }
        if let Some(grade) = &changes.grade_level {
            qb.push(", grade_level = ").push_bind(grade.as_str());
        }
        if let Some(v) = changes.requires_junaeb {
            qb.push(", requires_junaeb = ").push_bind(v);
        }
        if let Some(v) = changes.requires_transport {
            qb.push(", requires_transport = ").push_bind(v);
        }
        if let Some(v) = changes.requires_extended_hours {
            qb.push(", requires_extended_hours = ").push_bind(v);
        }
        if let Some(p) = changes.junaeb_priority {
            qb.push(", junaeb_priority = ").push_bind(p.as_str());
        }
        if let Some(p) = changes.transport_priority {
            qb.push(", transport_priority = ").push_bind(p.as_str());
        }
        if let Some(p) = changes.extended_hours_priority {
            qb.push(", extended_hours_priority = ").push_bind(p.as_str());
        }
        if let Some(obs) = &changes.observations {
            qb.push(", observations = ").push_bind(obs.as_str());
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(date) = changes.enrollment_date {
            qb.push(", enrollment_date = ").push_bind(date);
        }
        qb.push(" WHERE id = ").push_bind(*id.as_uuid());
        qb.push(" RETURNING ").push(ENROLLMENT_COLUMNS);

        qb.build()
            .try_map(|row: PgRow| decode_enrollment(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_enrollment", e))
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_enrollment", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_student(&self, id: StudentId) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM enrollments WHERE student_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_student", e))?;
        let referenced: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("delete_student", e))?;
        if referenced > 0 {
            return Err(StoreError::RestrictViolation(format!(
                "student {id} is still referenced by {referenced} enrollment(s)"
            )));
        }

        // Child rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_student", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(user.id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.role_id.map(|r| *r.as_uuid()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .try_map(|row: PgRow| decode_user(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .try_map(|row: PgRow| decode_user(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_id", e))
    }

    #[instrument(skip(self, id, changes), fields(user_id = %id), err)]
    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE users SET updated_at = ");
        qb.push_bind(now);
        if let Some(first_name) = changes.first_name {
            qb.push(", first_name = ").push_bind(first_name);
        }
        if let Some(last_name) = changes.last_name {
            qb.push(", last_name = ").push_bind(last_name);
        }
        if let Some(email) = changes.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(password_hash) = changes.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash);
        }
        if let Some(role_id) = changes.role_id {
            qb.push(", role_id = ").push_bind(*role_id.as_uuid());
        }
        qb.push(" WHERE id = ").push_bind(*id.as_uuid());
        qb.push(" RETURNING ").push(USER_COLUMNS);

        qb.build()
            .try_map(|row: PgRow| decode_user(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RoleStore for PostgresStore {
    async fn insert_role(&self, role: Role) -> Result<Role, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO roles ({ROLE_COLUMNS}) VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.created_at)
        .bind(role.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(role)
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(id.as_uuid())
            .try_map(|row: PgRow| decode_role(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_id", e))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE name = $1"))
            .bind(name)
            .try_map(|row: PgRow| decode_role(&row))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role_by_name", e))
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY created_at, name"
        ))
        .try_map(|row: PgRow| decode_role(&row))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        Ok(result.rows_affected() > 0)
    }
}

// --- row decoding -----------------------------------------------------------

fn parse_kind<T>(raw: String) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = ModelError>,
{
    raw.parse().map_err(|e: ModelError| sqlx::Error::Decode(Box::new(e)))
}

fn parse_optional_kind<T>(raw: Option<String>) -> Result<Option<T>, sqlx::Error>
where
    T: FromStr<Err = ModelError>,
{
    raw.map(parse_kind).transpose()
}

fn decode_user(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_active: row.try_get("is_active")?,
        role_id: row
            .try_get::<Option<Uuid>, _>("role_id")?
            .map(RoleId::from_uuid),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_role(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_student(row: &PgRow) -> Result<Student, sqlx::Error> {
    Ok(Student {
        id: StudentId::from_uuid(row.try_get("id")?),
        names: row.try_get("names")?,
        last_names: row.try_get("last_names")?,
        rut: row.try_get("rut")?,
        birth_date: row.try_get("birth_date")?,
        nationality: row.try_get("nationality")?,
        current_address: row.try_get("current_address")?,
        commune: row.try_get("commune")?,
        gender: parse_kind(row.try_get("gender")?)?,
        prevision: row.try_get("prevision")?,
        medical_conditions: row.try_get("medical_conditions")?,
        allergies: row.try_get("allergies")?,
        medications: row.try_get("medications")?,
        special_needs: row.try_get("special_needs")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_parent(row: &PgRow) -> Result<Parent, sqlx::Error> {
    Ok(Parent {
        id: ParentId::from_uuid(row.try_get("id")?),
        student_id: StudentId::from_uuid(row.try_get("student_id")?),
        parent_type: parse_kind(row.try_get("parent_type")?)?,
        names: row.try_get("names")?,
        last_names: row.try_get("last_names")?,
        rut: row.try_get("rut")?,
        nationality: row.try_get("nationality")?,
        occupation: row.try_get("occupation")?,
        education_level: row.try_get("education_level")?,
        workplace: row.try_get("workplace")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_household(row: &PgRow) -> Result<Household, sqlx::Error> {
    Ok(Household {
        household_head: parse_optional_kind(row.try_get("household_head")?)?,
        household_head_other: row.try_get("household_head_other")?,
        monthly_income: parse_optional_kind(row.try_get("monthly_income")?)?,
        social_program_chile_solidario: row.try_get("social_program_chile_solidario")?,
        social_program_puente: row.try_get("social_program_puente")?,
        social_program_suf: row.try_get("social_program_suf")?,
        social_program_other: row.try_get("social_program_other")?,
        housing_type: parse_optional_kind(row.try_get("housing_type")?)?,
        housing_structure: row.try_get("housing_structure")?,
        has_drinking_water: row.try_get("has_drinking_water")?,
        has_electricity: row.try_get("has_electricity")?,
        bedrooms_count: row.try_get("bedrooms_count")?,
        residents_count: row.try_get("residents_count")?,
        cas_index: row.try_get("cas_index")?,
    })
}

fn decode_family_information(row: &PgRow) -> Result<FamilyInformation, sqlx::Error> {
    Ok(FamilyInformation {
        id: FamilyInformationId::from_uuid(row.try_get("id")?),
        student_id: StudentId::from_uuid(row.try_get("student_id")?),
        household: decode_household(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_authorized_person(row: &PgRow) -> Result<AuthorizedPerson, sqlx::Error> {
    Ok(AuthorizedPerson {
        id: AuthorizedPersonId::from_uuid(row.try_get("id")?),
        student_id: StudentId::from_uuid(row.try_get("student_id")?),
        household: decode_household(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_representative(row: &PgRow) -> Result<Representative, sqlx::Error> {
    Ok(Representative {
        id: RepresentativeId::from_uuid(row.try_get("id")?),
        student_id: StudentId::from_uuid(row.try_get("student_id")?),
        names: row.try_get("names")?,
        last_names: row.try_get("last_names")?,
        rut: row.try_get("rut")?,
        relationship: row.try_get("relationship")?,
        address: row.try_get("address")?,
        commune: row.try_get("commune")?,
        phone: row.try_get("phone")?,
        mobile_phone: row.try_get("mobile_phone")?,
        email: row.try_get("email")?,
        occupation: row.try_get("occupation")?,
        education_level: row.try_get("education_level")?,
        workplace: row.try_get("workplace")?,
        workplace_phone: row.try_get("workplace_phone")?,
        workplace_address: row.try_get("workplace_address")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_enrollment(row: &PgRow) -> Result<Enrollment, sqlx::Error> {
    Ok(Enrollment {
        id: EnrollmentId::from_uuid(row.try_get("id")?),
        enrollment_number: row.try_get("enrollment_number")?,
        student_id: StudentId::from_uuid(row.try_get("student_id")?),
        academic_year: row.try_get("academic_year")?,
        grade_level: row.try_get("grade_level")?,
        requires_junaeb: row.try_get("requires_junaeb")?,
        requires_transport: row.try_get("requires_transport")?,
        requires_extended_hours: row.try_get("requires_extended_hours")?,
        junaeb_priority: parse_optional_kind(row.try_get("junaeb_priority")?)?,
        transport_priority: parse_optional_kind(row.try_get("transport_priority")?)?,
        extended_hours_priority: parse_optional_kind(row.try_get("extended_hours_priority")?)?,
        observations: row.try_get("observations")?,
        registered_by_user_id: row
            .try_get::<Option<Uuid>, _>("registered_by_user_id")?
            .map(UserId::from_uuid),
        status: parse_kind(row.try_get("status")?)?,
        enrollment_date: row.try_get("enrollment_date")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_every_named_constraint() {
        use crate::store::constraints::*;
        for name in [
            USERS_EMAIL,
            ROLES_NAME,
            STUDENTS_RUT,
            FAMILY_INFORMATION_STUDENT,
            AUTHORIZED_PERSONS_STUDENT,
            REPRESENTATIVES_STUDENT,
            ENROLLMENTS_NUMBER,
            ENROLLMENTS_STUDENT_YEAR,
        ] {
            assert!(SCHEMA.contains(name), "schema is missing constraint {name}");
        }
    }

    #[test]
    fn schema_check_lists_match_wire_spellings() {
        use matricula_enrollments::{EnrollmentStatus, Gender, MonthlyIncome};
        for v in Gender::ALL {
            assert!(SCHEMA.contains(&format!("'{}'", v.as_str())));
        }
        for v in MonthlyIncome::ALL {
            assert!(SCHEMA.contains(&format!("'{}'", v.as_str())));
        }
        for v in EnrollmentStatus::ALL {
            assert!(SCHEMA.contains(&format!("'{}'", v.as_str())));
        }
    }

    #[test]
    fn unknown_spelling_is_a_decode_error() {
        let err = parse_kind::<matricula_enrollments::Priority>("MEDIA".to_string()).unwrap_err();
        assert!(matches!(err, sqlx::Error::Decode(_)));
    }
}
