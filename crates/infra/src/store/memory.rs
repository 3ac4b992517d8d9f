use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use matricula_auth::{Role, User, UserChanges};
use matricula_core::{EnrollmentId, Entity, RoleId, StudentId, UserId};
use matricula_enrollments::{
    AuthorizedPerson, Enrollment, EnrollmentChanges, EnrollmentDetails, EnrollmentRef,
    FamilyInformation, Parent, Representative, Student, StudentDetails,
};

use super::constraints;
use super::{EnrollmentDb, EnrollmentTx, RoleStore, UserStore};
use crate::error::StoreError;

/// Width of the `students.rut` column.
const STUDENT_RUT_MAX_CHARS: usize = 12;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    roles: Vec<Role>,
    students: Vec<Student>,
    parents: Vec<Parent>,
    family_information: Vec<FamilyInformation>,
    authorized_persons: Vec<AuthorizedPerson>,
    representatives: Vec<Representative>,
    enrollments: Vec<Enrollment>,
}

/// Writes of an open transaction, invisible to everyone else until commit.
#[derive(Debug, Default)]
struct Staged {
    students: Vec<Student>,
    parents: Vec<Parent>,
    family_information: Vec<FamilyInformation>,
    authorized_persons: Vec<AuthorizedPerson>,
    representatives: Vec<Representative>,
    enrollments: Vec<Enrollment>,
}

/// Row counts per aggregate table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub students: usize,
    pub parents: usize,
    pub family_information: usize,
    pub authorized_persons: usize,
    pub representatives: usize,
    pub enrollments: usize,
}

/// In-memory relational store with read-committed transactions.
///
/// Intended for tests/dev. A transaction reads committed rows plus its own
/// staged rows. Unique constraints are checked on insert and again at commit,
/// so two transactions that each pass the insert-time check still cannot both
/// commit a clashing row.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::poisoned())
    }

    pub fn row_counts(&self) -> Result<RowCounts, StoreError> {
        let t = self.read()?;
        Ok(RowCounts {
            students: t.students.len(),
            parents: t.parents.len(),
            family_information: t.family_information.len(),
            authorized_persons: t.authorized_persons.len(),
            representatives: t.representatives.len(),
            enrollments: t.enrollments.len(),
        })
    }
}

fn ensure_unique<'a, T: 'a>(
    mut rows: impl Iterator<Item = &'a T>,
    clashes: impl Fn(&T) -> bool,
    constraint: &str,
) -> Result<(), StoreError> {
    if rows.any(|row| clashes(row)) {
        Err(StoreError::unique(constraint))
    } else {
        Ok(())
    }
}

fn by_id<E: Entity>(rows: &[E], id: E::Id) -> Option<&E> {
    rows.iter().find(|row| row.id() == id)
}

fn position_of<E: Entity>(rows: &[E], id: E::Id) -> Option<usize> {
    rows.iter().position(|row| row.id() == id)
}

fn ensure_student_exists<'a>(
    mut students: impl Iterator<Item = &'a Student>,
    id: StudentId,
    table: &str,
) -> Result<(), StoreError> {
    if students.any(|s| s.id == id) {
        Ok(())
    } else {
        Err(StoreError::ForeignKeyViolation(format!(
            "{table}.student_id references missing student {id}"
        )))
    }
}

fn ensure_user_exists(users: &[User], id: Option<UserId>) -> Result<(), StoreError> {
    match id {
        Some(id) if by_id(users, id).is_none() => Err(StoreError::ForeignKeyViolation(
            format!("enrollments.registered_by_user_id references missing user {id}"),
        )),
        _ => Ok(()),
    }
}

fn ensure_role_exists(roles: &[Role], id: Option<RoleId>) -> Result<(), StoreError> {
    match id {
        Some(id) if by_id(roles, id).is_none() => Err(StoreError::ForeignKeyViolation(
            format!("users.role_id references missing role {id}"),
        )),
        _ => Ok(()),
    }
}

fn check_enrollment<'a>(
    rows: impl Iterator<Item = &'a Enrollment> + Clone,
    row: &Enrollment,
) -> Result<(), StoreError> {
    ensure_unique(
        rows.clone(),
        |e| e.enrollment_number == row.enrollment_number,
        constraints::ENROLLMENTS_NUMBER,
    )?;
    ensure_unique(
        rows,
        |e| e.student_id == row.student_id && e.academic_year == row.academic_year,
        constraints::ENROLLMENTS_STUDENT_YEAR,
    )
}

impl Staged {
    /// Re-check every staged row against what committed meanwhile.
    fn validate(&self, t: &Tables) -> Result<(), StoreError> {
        let students = || t.students.iter().chain(self.students.iter());

        for s in &self.students {
            ensure_unique(t.students.iter(), |x| x.rut == s.rut, constraints::STUDENTS_RUT)?;
        }
        for p in &self.parents {
            ensure_student_exists(students(), p.student_id, "parents")?;
        }
        for f in &self.family_information {
            ensure_unique(
                t.family_information.iter(),
                |x| x.student_id == f.student_id,
                constraints::FAMILY_INFORMATION_STUDENT,
            )?;
            ensure_student_exists(students(), f.student_id, "family_information")?;
        }
        for a in &self.authorized_persons {
            ensure_unique(
                t.authorized_persons.iter(),
                |x| x.student_id == a.student_id,
                constraints::AUTHORIZED_PERSONS_STUDENT,
            )?;
            ensure_student_exists(students(), a.student_id, "authorized_persons")?;
        }
        for r in &self.representatives {
            ensure_unique(
                t.representatives.iter(),
                |x| x.student_id == r.student_id,
                constraints::REPRESENTATIVES_STUDENT,
            )?;
            ensure_student_exists(students(), r.student_id, "representatives")?;
        }
        for e in &self.enrollments {
            check_enrollment(t.enrollments.iter(), e)?;
            ensure_student_exists(students(), e.student_id, "enrollments")?;
            ensure_user_exists(&t.users, e.registered_by_user_id)?;
        }
        Ok(())
    }
}

impl Tables {
    fn details(&self, enrollment: &Enrollment) -> Option<EnrollmentDetails> {
        let student = by_id(&self.students, enrollment.student_id)?.clone();
        let sid = student.id;

        Some(EnrollmentDetails {
            enrollment: enrollment.clone(),
            student: StudentDetails {
                student,
                parents: self
                    .parents
                    .iter()
                    .filter(|p| p.student_id == sid)
                    .cloned()
                    .collect(),
                family_information: self
                    .family_information
                    .iter()
                    .find(|f| f.student_id == sid)
                    .cloned(),
                authorized_person: self
                    .authorized_persons
                    .iter()
                    .find(|a| a.student_id == sid)
                    .cloned(),
                representative: self
                    .representatives
                    .iter()
                    .find(|r| r.student_id == sid)
                    .cloned(),
            },
        })
    }

    fn enrollment(&self, target: &EnrollmentRef) -> Option<&Enrollment> {
        match target {
            EnrollmentRef::ById(id) => by_id(&self.enrollments, *id),
            EnrollmentRef::ByNumber(number) => self
                .enrollments
                .iter()
                .find(|e| e.enrollment_number == *number),
        }
    }
}

/// Open transaction on an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryTx {
    tables: Arc<RwLock<Tables>>,
    staged: Staged,
}

impl InMemoryTx {
    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::poisoned())
    }
}

#[async_trait]
impl EnrollmentTx for InMemoryTx {
    async fn student_exists_by_rut(&mut self, rut: &str) -> Result<bool, StoreError> {
        let t = self.read()?;
        Ok(t
            .students
            .iter()
            .chain(self.staged.students.iter())
            .any(|s| s.rut == rut))
    }

    async fn insert_student(&mut self, student: &Student) -> Result<(), StoreError> {
        if student.rut.chars().count() > STUDENT_RUT_MAX_CHARS {
            return Err(StoreError::Database(format!(
                "insert_student failed: value too long for students.rut (max {STUDENT_RUT_MAX_CHARS})"
            )));
        }
        {
            let t = self.read()?;
            ensure_unique(
                t.students.iter().chain(self.staged.students.iter()),
                |s| s.rut == student.rut,
                constraints::STUDENTS_RUT,
            )?;
        }
        self.staged.students.push(student.clone());
        Ok(())
    }

    async fn insert_parents(&mut self, parents: &[Parent]) -> Result<(), StoreError> {
        {
            let t = self.read()?;
            for p in parents {
                ensure_student_exists(
                    t.students.iter().chain(self.staged.students.iter()),
                    p.student_id,
                    "parents",
                )?;
            }
        }
        self.staged.parents.extend_from_slice(parents);
        Ok(())
    }

    async fn insert_family_information(
        &mut self,
        row: &FamilyInformation,
    ) -> Result<(), StoreError> {
        {
            let t = self.read()?;
            ensure_unique(
                t.family_information
                    .iter()
                    .chain(self.staged.family_information.iter()),
                |f| f.student_id == row.student_id,
                constraints::FAMILY_INFORMATION_STUDENT,
            )?;
            ensure_student_exists(
                t.students.iter().chain(self.staged.students.iter()),
                row.student_id,
                "family_information",
            )?;
        }
        self.staged.family_information.push(row.clone());
        Ok(())
    }

    async fn insert_authorized_person(
        &mut self,
        row: &AuthorizedPerson,
    ) -> Result<(), StoreError> {
        {
            let t = self.read()?;
            ensure_unique(
                t.authorized_persons
                    .iter()
                    .chain(self.staged.authorized_persons.iter()),
                |a| a.student_id == row.student_id,
                constraints::AUTHORIZED_PERSONS_STUDENT,
            )?;
            ensure_student_exists(
                t.students.iter().chain(self.staged.students.iter()),
                row.student_id,
                "authorized_persons",
            )?;
        }
        self.staged.authorized_persons.push(row.clone());
        Ok(())
    }

    async fn insert_representative(&mut self, row: &Representative) -> Result<(), StoreError> {
        {
            let t = self.read()?;
            ensure_unique(
                t.representatives
                    .iter()
                    .chain(self.staged.representatives.iter()),
                |r| r.student_id == row.student_id,
                constraints::REPRESENTATIVES_STUDENT,
            )?;
            ensure_student_exists(
                t.students.iter().chain(self.staged.students.iter()),
                row.student_id,
                "representatives",
            )?;
        }
        self.staged.representatives.push(row.clone());
        Ok(())
    }

    async fn count_enrollments_for_year(
        &mut self,
        academic_year: i32,
    ) -> Result<u64, StoreError> {
        let t = self.read()?;
        let count = t
            .enrollments
            .iter()
            .chain(self.staged.enrollments.iter())
            .filter(|e| e.academic_year == academic_year)
            .count();
        Ok(count as u64)
    }

    async fn insert_enrollment(&mut self, row: &Enrollment) -> Result<(), StoreError> {
        {
            let t = self.read()?;
            check_enrollment(
                t.enrollments.iter().chain(self.staged.enrollments.iter()),
                row,
            )?;
            ensure_student_exists(
                t.students.iter().chain(self.staged.students.iter()),
                row.student_id,
                "enrollments",
            )?;
            ensure_user_exists(&t.users, row.registered_by_user_id)?;
        }
        self.staged.enrollments.push(row.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTx { tables, staged } = self;
        let mut t = tables.write().map_err(|_| StoreError::poisoned())?;
        staged.validate(&t)?;

        t.students.extend(staged.students);
        t.parents.extend(staged.parents);
        t.family_information.extend(staged.family_information);
        t.authorized_persons.extend(staged.authorized_persons);
        t.representatives.extend(staged.representatives);
        t.enrollments.extend(staged.enrollments);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl EnrollmentDb for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        Ok(InMemoryTx {
            tables: Arc::clone(&self.tables),
            staged: Staged::default(),
        })
    }

    async fn find_details(
        &self,
        target: &EnrollmentRef,
    ) -> Result<Option<EnrollmentDetails>, StoreError> {
        let t = self.read()?;
        Ok(t.enrollment(target).and_then(|e| t.details(e)))
    }

    async fn find_enrollment(
        &self,
        target: &EnrollmentRef,
    ) -> Result<Option<Enrollment>, StoreError> {
        let t = self.read()?;
        Ok(t.enrollment(target).cloned())
    }

    async fn list_details(&self) -> Result<Vec<EnrollmentDetails>, StoreError> {
        let t = self.read()?;
        // Newest insert first among equal timestamps; the sort is stable.
        let mut rows: Vec<&Enrollment> = t.enrollments.iter().rev().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows.into_iter().filter_map(|e| t.details(e)).collect())
    }

    async fn update_enrollment(
        &self,
        id: EnrollmentId,
        changes: &EnrollmentChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, StoreError> {
        let mut t = self.write()?;
        let Some(idx) = position_of(&t.enrollments, id) else {
            return Ok(None);
        };

        let mut updated = t.enrollments[idx].clone();
        updated.apply(changes, now);
        check_enrollment(
            t.enrollments.iter().filter(|e| e.id != id),
            &updated,
        )?;

        t.enrollments[idx] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.enrollments.len();
        t.enrollments.retain(|e| e.id != id);
        Ok(t.enrollments.len() != before)
    }

    async fn delete_student(&self, id: StudentId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if by_id(&t.students, id).is_none() {
            return Ok(false);
        }
        if t.enrollments.iter().any(|e| e.student_id == id) {
            return Err(StoreError::RestrictViolation(format!(
                "student {id} is still referenced by enrollments"
            )));
        }

        t.students.retain(|s| s.id != id);
        t.parents.retain(|p| p.student_id != id);
        t.family_information.retain(|f| f.student_id != id);
        t.authorized_persons.retain(|a| a.student_id != id);
        t.representatives.retain(|r| r.student_id != id);
        Ok(true)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut t = self.write()?;
        ensure_unique(
            t.users.iter(),
            |u| u.email == user.email,
            constraints::USERS_EMAIL,
        )?;
        ensure_role_exists(&t.roles, user.role_id)?;
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.read()?;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let t = self.read()?;
        Ok(by_id(&t.users, id).cloned())
    }

    async fn update_user(
        &self,
        id: UserId,
        changes: UserChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut t = self.write()?;
        let Some(idx) = position_of(&t.users, id) else {
            return Ok(None);
        };

        let mut updated = t.users[idx].clone();
        updated.apply(changes, now);
        ensure_unique(
            t.users.iter().filter(|u| u.id != id),
            |u| u.email == updated.email,
            constraints::USERS_EMAIL,
        )?;
        ensure_role_exists(&t.roles, updated.role_id)?;

        t.users[idx] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Ok(false);
        }
        for e in t
            .enrollments
            .iter_mut()
            .filter(|e| e.registered_by_user_id == Some(id))
        {
            e.registered_by_user_id = None;
        }
        Ok(true)
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn insert_role(&self, role: Role) -> Result<Role, StoreError> {
        let mut t = self.write()?;
        ensure_unique(
            t.roles.iter(),
            |r| r.name == role.name,
            constraints::ROLES_NAME,
        )?;
        t.roles.push(role.clone());
        Ok(role)
    }

    async fn find_role_by_id(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let t = self.read()?;
        Ok(by_id(&t.roles, id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.clone())
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let before = t.roles.len();
        t.roles.retain(|r| r.id != id);
        if t.roles.len() == before {
            return Ok(false);
        }
        for u in t.users.iter_mut().filter(|u| u.role_id == Some(id)) {
            u.role_id = None;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use matricula_auth::{NewRole, NewUser};
    use matricula_enrollments::{EnrollmentStatus, Gender, Household, ParentType};

    fn student(rut: &str) -> Student {
        let now = Utc::now();
        Student {
            id: StudentId::new(),
            names: "Sofía".to_string(),
            last_names: "Pérez".to_string(),
            rut: rut.to_string(),
            birth_date: NaiveDate::from_ymd_opt(2019, 5, 2).unwrap(),
            nationality: "Chilena".to_string(),
            current_address: "Av. Siempre Viva 123".to_string(),
            commune: None,
            gender: Gender::Female,
            prevision: None,
            medical_conditions: None,
            allergies: None,
            medications: None,
            special_needs: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn parent(student_id: StudentId) -> Parent {
        let now = Utc::now();
        Parent {
            id: matricula_core::ParentId::new(),
            student_id,
            parent_type: ParentType::Mother,
            names: "Carla".to_string(),
            last_names: "Soto".to_string(),
            rut: None,
            nationality: None,
            occupation: None,
            education_level: None,
            workplace: None,
            phone: None,
            email: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn enrollment(student_id: StudentId, year: i32, number: &str) -> Enrollment {
        let now = Utc::now();
        Enrollment {
            id: EnrollmentId::new(),
            enrollment_number: number.to_string(),
            student_id,
            academic_year: year,
            grade_level: "1° Básico".to_string(),
            requires_junaeb: false,
            requires_transport: false,
            requires_extended_hours: false,
            junaeb_priority: None,
            transport_priority: None,
            extended_hours_priority: None,
            observations: None,
            registered_by_user_id: None,
            status: EnrollmentStatus::Active,
            enrollment_date: NaiveDate::from_ymd_opt(year, 3, 1).unwrap(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn commit_aggregate(store: &InMemoryStore, rut: &str, year: i32, number: &str) -> Enrollment {
        let mut tx = store.begin().await.unwrap();
        let s = student(rut);
        tx.insert_student(&s).await.unwrap();
        tx.insert_parents(&[parent(s.id)]).await.unwrap();
        let e = enrollment(s.id, year, number);
        tx.insert_enrollment(&e).await.unwrap();
        tx.commit().await.unwrap();
        e
    }

    #[tokio::test]
    async fn staged_rows_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let s = student("1-9");
        tx.insert_student(&s).await.unwrap();

        assert!(tx.student_exists_by_rut("1-9").await.unwrap());
        assert_eq!(store.row_counts().unwrap().students, 0);

        tx.commit().await.unwrap();
        assert_eq!(store.row_counts().unwrap().students, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            let s = student("1-9");
            tx.insert_student(&s).await.unwrap();
            tx.insert_parents(&[parent(s.id), parent(s.id)]).await.unwrap();
        }
        assert_eq!(store.row_counts().unwrap(), RowCounts::default());
    }

    #[tokio::test]
    async fn racing_count_then_insert_cannot_commit_the_same_number() {
        let store = InMemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        // Both read the same count before either commits.
        assert_eq!(first.count_enrollments_for_year(2026).await.unwrap(), 0);
        assert_eq!(second.count_enrollments_for_year(2026).await.unwrap(), 0);

        let a = student("1-9");
        let b = student("2-7");
        first.insert_student(&a).await.unwrap();
        second.insert_student(&b).await.unwrap();
        first
            .insert_enrollment(&enrollment(a.id, 2026, "MAT-26-0001"))
            .await
            .unwrap();
        second
            .insert_enrollment(&enrollment(b.id, 2026, "MAT-26-0001"))
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert_eq!(err, StoreError::unique(constraints::ENROLLMENTS_NUMBER));

        let counts = store.row_counts().unwrap();
        assert_eq!(counts.students, 1);
        assert_eq!(counts.enrollments, 1);
    }

    #[tokio::test]
    async fn racing_duplicate_rut_fails_at_commit() {
        let store = InMemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        first.insert_student(&student("1-9")).await.unwrap();
        second.insert_student(&student("1-9")).await.unwrap();

        first.commit().await.unwrap();
        assert_eq!(
            second.commit().await.unwrap_err(),
            StoreError::unique(constraints::STUDENTS_RUT)
        );
    }

    #[tokio::test]
    async fn same_student_cannot_enroll_twice_in_a_year() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let s = student("1-9");
        tx.insert_student(&s).await.unwrap();
        tx.insert_enrollment(&enrollment(s.id, 2026, "MAT-26-0001"))
            .await
            .unwrap();

        let err = tx
            .insert_enrollment(&enrollment(s.id, 2026, "MAT-26-0002"))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::unique(constraints::ENROLLMENTS_STUDENT_YEAR));
    }

    #[tokio::test]
    async fn child_rows_require_a_student() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_parents(&[parent(StudentId::new())]).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn household_records_are_one_per_student() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let s = student("1-9");
        tx.insert_student(&s).await.unwrap();

        let now = Utc::now();
        tx.insert_family_information(&Household::default().into_family_information(s.id, now))
            .await
            .unwrap();
        let err = tx
            .insert_family_information(&Household::default().into_family_information(s.id, now))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::unique(constraints::FAMILY_INFORMATION_STUDENT)
        );

        // Structurally identical, but a separate table.
        tx.insert_authorized_person(&Household::default().into_authorized_person(s.id, now))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn student_delete_is_restricted_by_enrollments_then_cascades() {
        let store = InMemoryStore::new();
        let e = commit_aggregate(&store, "1-9", 2026, "MAT-26-0001").await;

        let err = store.delete_student(e.student_id).await.unwrap_err();
        assert!(matches!(err, StoreError::RestrictViolation(_)));
        assert_eq!(store.row_counts().unwrap().parents, 1);

        assert!(store.delete_enrollment(e.id).await.unwrap());
        assert!(store.delete_student(e.student_id).await.unwrap());
        assert_eq!(store.row_counts().unwrap(), RowCounts::default());
    }

    #[tokio::test]
    async fn deleting_a_user_nulls_registered_by() {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(
                NewUser {
                    first_name: "Ana".to_string(),
                    last_name: "Rojas".to_string(),
                    email: "ana@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    role_id: None,
                }
                .into_user(Utc::now()),
            )
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let s = student("1-9");
        tx.insert_student(&s).await.unwrap();
        let mut e = enrollment(s.id, 2026, "MAT-26-0001");
        e.registered_by_user_id = Some(user.id);
        tx.insert_enrollment(&e).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        let stored = store
            .find_enrollment(&EnrollmentRef::ById(e.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.registered_by_user_id, None);
    }

    #[tokio::test]
    async fn deleting_a_role_nulls_user_role() {
        let store = InMemoryStore::new();
        let role = store
            .insert_role(
                NewRole {
                    name: "User".to_string(),
                    description: "default".to_string(),
                }
                .into_role(Utc::now()),
            )
            .await
            .unwrap();
        let user = store
            .insert_user(
                NewUser {
                    first_name: "Ana".to_string(),
                    last_name: "Rojas".to_string(),
                    email: "ana@example.com".to_string(),
                    password_hash: "hash".to_string(),
                    role_id: Some(role.id),
                }
                .into_user(Utc::now()),
            )
            .await
            .unwrap();

        assert!(store.delete_role(role.id).await.unwrap());
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.role_id, None);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryStore::new();
        let older = commit_aggregate(&store, "1-9", 2026, "MAT-26-0001").await;

        let mut tx = store.begin().await.unwrap();
        let s = student("2-7");
        tx.insert_student(&s).await.unwrap();
        let mut newer = enrollment(s.id, 2026, "MAT-26-0002");
        newer.created_at = older.created_at + Duration::seconds(5);
        tx.insert_enrollment(&newer).await.unwrap();
        tx.commit().await.unwrap();

        let listed: Vec<String> = store
            .list_details()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.enrollment.enrollment_number)
            .collect();
        assert_eq!(listed, vec!["MAT-26-0002", "MAT-26-0001"]);
    }

    #[tokio::test]
    async fn update_rejects_year_clash_for_same_student() {
        let store = InMemoryStore::new();
        let first = commit_aggregate(&store, "1-9", 2026, "MAT-26-0001").await;

        let mut tx = store.begin().await.unwrap();
        let second = enrollment(first.student_id, 2027, "MAT-27-0001");
        tx.insert_enrollment(&second).await.unwrap();
        tx.commit().await.unwrap();

        let changes = EnrollmentChanges {
            academic_year: Some(2026),
            ..Default::default()
        };
        let err = store
            .update_enrollment(second.id, &changes, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let make = || {
            NewUser {
                first_name: "Ana".to_string(),
                last_name: "Rojas".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "hash".to_string(),
                role_id: None,
            }
            .into_user(Utc::now())
        };
        store.insert_user(make()).await.unwrap();
        assert_eq!(
            store.insert_user(make()).await.unwrap_err(),
            StoreError::unique(constraints::USERS_EMAIL)
        );
        // Emails are compared exactly as stored.
        let mut other = make();
        other.email = "Ana@example.com".to_string();
        store.insert_user(other).await.unwrap();
    }
}
