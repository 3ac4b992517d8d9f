//! Enrollment aggregate store: the transactional write path and the
//! eager-loading read path over an [`EnrollmentDb`] backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use matricula_core::{DomainError, DomainResult, EnrollmentId};
use matricula_enrollments::{
    CreateEnrollment, EnrollmentDetails, EnrollmentRef, ModelError, UpdateEnrollment,
};

use crate::error::StoreError;
use crate::sequence::next_enrollment_number;
use crate::store::{EnrollmentDb, EnrollmentTx};

/// Object-safe face of the aggregate store, shared with the HTTP layer.
#[async_trait]
pub trait EnrollmentRegistry: Send + Sync {
    /// Create the student, its owned records and the enrollment in one
    /// transaction, then return the aggregate as re-read from the store.
    async fn create(&self, payload: CreateEnrollment) -> DomainResult<EnrollmentDetails>;

    /// Dual-identifier lookup: UUID-shaped input by id, anything else by number.
    async fn find_one(&self, id_or_number: &str) -> DomainResult<EnrollmentDetails>;

    async fn find_by_enrollment_number(&self, number: &str) -> DomainResult<EnrollmentDetails>;

    /// Merge the supplied fields and return the re-read aggregate.
    async fn update(
        &self,
        id_or_number: &str,
        payload: UpdateEnrollment,
    ) -> DomainResult<EnrollmentDetails>;

    async fn remove(&self, id_or_number: &str) -> DomainResult<()>;

    /// Every enrollment, most recently created first.
    async fn find_all(&self) -> DomainResult<Vec<EnrollmentDetails>>;
}

#[derive(Debug, Error)]
enum CreateError {
    #[error("a student with RUT {0} already exists")]
    DuplicateStudent(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CreateError> for DomainError {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::DuplicateStudent(rut) => {
                DomainError::conflict(format!("a student with RUT {rut} already exists"))
            }
            CreateError::Store(e) => write_error(e),
            CreateError::Model(e) => DomainError::bad_request(e.to_string()),
        }
    }
}

/// Uniqueness violations become `Conflict`; anything else keeps its message.
fn write_error(e: StoreError) -> DomainError {
    if e.is_unique_violation() {
        DomainError::conflict("duplicate enrollment")
    } else {
        DomainError::bad_request(e.to_string())
    }
}

fn read_error(e: StoreError) -> DomainError {
    error!(error = %e, "enrollment read failed");
    DomainError::bad_request(e.to_string())
}

fn not_found(id_or_number: &str) -> DomainError {
    warn!(id_or_number, "enrollment not found");
    DomainError::not_found(format!(
        "enrollment with id or number {id_or_number} not found"
    ))
}

/// Aggregate store over any transactional backend.
#[derive(Debug, Clone)]
pub struct EnrollmentAggregateStore<D> {
    db: D,
}

impl<D: EnrollmentDb> EnrollmentAggregateStore<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Steps 1-6 of creation; the caller owns commit and rollback.
    async fn write_aggregate(
        tx: &mut D::Tx,
        payload: CreateEnrollment,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentId, CreateError> {
        let (parts, fields) = payload.split();

        if tx.student_exists_by_rut(&parts.student.rut).await? {
            return Err(CreateError::DuplicateStudent(parts.student.rut));
        }

        let student = parts.student.into_student(now)?;
        tx.insert_student(&student).await?;

        let parents: Vec<_> = parts
            .parents
            .into_iter()
            .map(|p| p.into_parent(student.id, now))
            .collect();
        tx.insert_parents(&parents).await?;

        if let Some(household) = parts.family_information {
            tx.insert_family_information(&household.into_family_information(student.id, now))
                .await?;
        }
        if let Some(household) = parts.authorized_person {
            tx.insert_authorized_person(&household.into_authorized_person(student.id, now))
                .await?;
        }
        if let Some(representative) = parts.representative {
            tx.insert_representative(&representative.into_representative(student.id, now))
                .await?;
        }

        let number = next_enrollment_number(tx, fields.academic_year).await?;
        let enrollment = fields.into_enrollment(number, student.id, now)?;
        tx.insert_enrollment(&enrollment).await?;

        Ok(enrollment.id)
    }

    async fn load(&self, target: &EnrollmentRef) -> DomainResult<Option<EnrollmentDetails>> {
        self.db.find_details(target).await.map_err(read_error)
    }
}

#[async_trait]
impl<D: EnrollmentDb> EnrollmentRegistry for EnrollmentAggregateStore<D> {
    #[instrument(skip(self, payload), fields(academic_year = payload.academic_year), err)]
    async fn create(&self, payload: CreateEnrollment) -> DomainResult<EnrollmentDetails> {
        info!("creating enrollment");
        let mut tx = self.db.begin().await.map_err(write_error)?;

        let id = match Self::write_aggregate(&mut tx, payload, Utc::now()).await {
            Ok(id) => id,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                warn!(error = %err, "enrollment creation aborted");
                return Err(err.into());
            }
        };

        tx.commit().await.map_err(|e| {
            warn!(error = %e, "enrollment commit rejected");
            write_error(e)
        })?;

        // Return what the store holds, not what was written.
        let details = self
            .load(&EnrollmentRef::ById(id))
            .await?
            .ok_or_else(|| not_found(&id.to_string()))?;
        info!(
            enrollment_id = %id,
            enrollment_number = %details.enrollment.enrollment_number,
            "enrollment created"
        );
        Ok(details)
    }

    async fn find_one(&self, id_or_number: &str) -> DomainResult<EnrollmentDetails> {
        self.load(&EnrollmentRef::classify(id_or_number))
            .await?
            .ok_or_else(|| not_found(id_or_number))
    }

    async fn find_by_enrollment_number(&self, number: &str) -> DomainResult<EnrollmentDetails> {
        self.load(&EnrollmentRef::ByNumber(number.to_string()))
            .await?
            .ok_or_else(|| {
                warn!(number, "enrollment not found");
                DomainError::not_found(format!("enrollment with number {number} not found"))
            })
    }

    #[instrument(skip(self, payload), err)]
    async fn update(
        &self,
        id_or_number: &str,
        payload: UpdateEnrollment,
    ) -> DomainResult<EnrollmentDetails> {
        let existing = self
            .db
            .find_enrollment(&EnrollmentRef::classify(id_or_number))
            .await
            .map_err(read_error)?
            .ok_or_else(|| not_found(id_or_number))?;

        let changes = payload.into_changes()?;
        let updated = self
            .db
            .update_enrollment(existing.id, &changes, Utc::now())
            .await
            .map_err(|e| {
                warn!(error = %e, "enrollment update rejected");
                write_error(e)
            })?;
        if updated.is_none() {
            return Err(not_found(id_or_number));
        }

        info!(enrollment_id = %existing.id, "enrollment updated");
        self.load(&EnrollmentRef::ById(existing.id))
            .await?
            .ok_or_else(|| not_found(id_or_number))
    }

    #[instrument(skip(self), err)]
    async fn remove(&self, id_or_number: &str) -> DomainResult<()> {
        let existing = self
            .db
            .find_enrollment(&EnrollmentRef::classify(id_or_number))
            .await
            .map_err(read_error)?
            .ok_or_else(|| not_found(id_or_number))?;

        let deleted = self
            .db
            .delete_enrollment(existing.id)
            .await
            .map_err(write_error)?;
        if !deleted {
            return Err(not_found(id_or_number));
        }
        info!(enrollment_id = %existing.id, "enrollment removed");
        Ok(())
    }

    async fn find_all(&self) -> DomainResult<Vec<EnrollmentDetails>> {
        self.db.list_details().await.map_err(read_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matricula_enrollments::{EnrollmentStatus, Priority};

    use crate::store::{InMemoryStore, RowCounts};

    fn payload(rut: &str, year: i32) -> CreateEnrollment {
        serde_json::from_value(serde_json::json!({
            "student": {
                "names": "Sofía",
                "lastNames": "Pérez Soto",
                "rut": rut,
                "birthDate": "2019-05-02",
                "nationality": "Chilena",
                "currentAddress": "Av. Siempre Viva 123",
                "gender": "Femenino"
            },
            "parents": [
                { "parentType": "MADRE", "names": "Carla", "lastNames": "Soto" },
                { "parentType": "PADRE", "names": "Luis", "lastNames": "Pérez" }
            ],
            "familyInformation": { "householdHead": "AMBOS", "hasElectricity": true },
            "authorizedPerson": { "householdHead": "ABUELOS MAT" },
            "representative": { "names": "Carla", "lastNames": "Soto", "rut": "12.345.678-5" },
            "academicYear": year,
            "gradeLevel": "1° Básico",
            "requiresJunaeb": true,
            "junaebPriority": "ALTA",
            "enrollmentDate": "2026-03-01"
        }))
        .unwrap()
    }

    fn registry() -> (EnrollmentAggregateStore<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        (EnrollmentAggregateStore::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_numbers_by_year_and_returns_the_full_aggregate() {
        let (registry, _) = registry();
        let first = registry.create(payload("1-9", 2026)).await.unwrap();
        let second = registry.create(payload("2-7", 2026)).await.unwrap();
        let other_year = registry.create(payload("3-5", 2027)).await.unwrap();

        assert_eq!(first.enrollment.enrollment_number, "MAT-26-0001");
        assert_eq!(second.enrollment.enrollment_number, "MAT-26-0002");
        assert_eq!(other_year.enrollment.enrollment_number, "MAT-27-0001");

        assert_eq!(first.enrollment.status, EnrollmentStatus::Active);
        assert_eq!(first.enrollment.junaeb_priority, Some(Priority::High));
        assert_eq!(first.student.parents.len(), 2);
        assert!(first.student.family_information.as_ref().unwrap().household.has_electricity);
        assert!(first.student.authorized_person.is_some());
        assert_eq!(first.student.representative.as_ref().unwrap().rut, "12.345.678-5");
    }

    #[tokio::test]
    async fn duplicate_rut_is_a_conflict_and_leaves_no_rows() {
        let (registry, store) = registry();
        registry.create(payload("1-9", 2026)).await.unwrap();
        let before = store.row_counts().unwrap();

        let err = registry.create(payload("1-9", 2027)).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::conflict("a student with RUT 1-9 already exists")
        );
        assert_eq!(store.row_counts().unwrap(), before);
    }

    #[tokio::test]
    async fn bad_enrollment_date_rolls_back_everything() {
        let (registry, store) = registry();
        let mut bad = payload("1-9", 2026);
        bad.enrollment_date = "01/03/2026".to_string();

        let err = registry.create(bad).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
        assert_eq!(store.row_counts().unwrap(), RowCounts::default());
    }

    #[tokio::test]
    async fn unknown_registering_user_is_a_bad_request() {
        let (registry, store) = registry();
        let mut p = payload("1-9", 2026);
        p.registered_by_user_id = Some(matricula_core::UserId::new());

        assert!(matches!(
            registry.create(p).await,
            Err(DomainError::BadRequest(_))
        ));
        assert_eq!(store.row_counts().unwrap(), RowCounts::default());
    }

    #[tokio::test]
    async fn interleaved_creations_collide_at_commit_as_conflict() {
        let (registry, store) = registry();
        let now = Utc::now();

        // Both transactions count zero enrollments for 2026 before either commits.
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        EnrollmentAggregateStore::<InMemoryStore>::write_aggregate(
            &mut first,
            payload("1-9", 2026),
            now,
        )
        .await
        .unwrap();
        EnrollmentAggregateStore::<InMemoryStore>::write_aggregate(
            &mut second,
            payload("2-7", 2026),
            now,
        )
        .await
        .unwrap();

        first.commit().await.unwrap();
        let err = write_error(second.commit().await.unwrap_err());
        assert_eq!(err, DomainError::conflict("duplicate enrollment"));

        let all = registry.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].enrollment.enrollment_number, "MAT-26-0001");
        assert_eq!(all[0].student.student.rut, "1-9");
        let counts = store.row_counts().unwrap();
        assert_eq!((counts.students, counts.enrollments), (1, 1));
    }

    #[tokio::test]
    async fn over_long_rut_is_a_bad_request_and_leaves_no_rows() {
        let (registry, store) = registry();

        let err = registry
            .create(payload("12.345.678-9-EXTRA-LONG", 2026))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::BadRequest(_)));
        assert_eq!(store.row_counts().unwrap(), RowCounts::default());
    }

    #[tokio::test]
    async fn lookup_by_id_and_by_number_return_the_same_aggregate() {
        let (registry, _) = registry();
        let created = registry.create(payload("1-9", 2026)).await.unwrap();

        let by_id = registry
            .find_one(&created.enrollment.id.to_string())
            .await
            .unwrap();
        let by_number = registry.find_one("MAT-26-0001").await.unwrap();
        let by_number_only = registry
            .find_by_enrollment_number("MAT-26-0001")
            .await
            .unwrap();

        assert_eq!(by_id, by_number);
        assert_eq!(by_number, by_number_only);
        assert_eq!(by_id.student.parents, created.student.parents);
    }

    #[tokio::test]
    async fn missing_enrollment_names_the_identifier() {
        let (registry, _) = registry();
        assert_eq!(
            registry.find_one("MAT-99-0001").await.unwrap_err(),
            DomainError::not_found("enrollment with id or number MAT-99-0001 not found")
        );
        assert_eq!(
            registry
                .find_by_enrollment_number("MAT-99-0001")
                .await
                .unwrap_err(),
            DomainError::not_found("enrollment with number MAT-99-0001 not found")
        );
    }

    #[tokio::test]
    async fn update_with_observations_only_touches_observations() {
        let (registry, _) = registry();
        let created = registry.create(payload("1-9", 2026)).await.unwrap();

        let updated = registry
            .update(
                "MAT-26-0001",
                UpdateEnrollment {
                    observations: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.enrollment.observations.as_deref(), Some("x"));
        let mut expected = created.enrollment.clone();
        expected.observations = Some("x".to_string());
        expected.updated_at = updated.enrollment.updated_at;
        assert_eq!(updated.enrollment, expected);
        assert_eq!(updated.student, created.student);
    }

    #[tokio::test]
    async fn update_into_an_existing_year_is_a_conflict() {
        let (registry, store) = registry();
        let created = registry.create(payload("1-9", 2026)).await.unwrap();

        // A second enrollment of the same student, in another year.
        let mut tx = store.begin().await.unwrap();
        let mut next_year = created.enrollment.clone();
        next_year.id = EnrollmentId::new();
        next_year.academic_year = 2027;
        next_year.enrollment_number = "MAT-27-0001".to_string();
        tx.insert_enrollment(&next_year).await.unwrap();
        tx.commit().await.unwrap();

        let err = registry
            .update(
                "MAT-27-0001",
                UpdateEnrollment {
                    academic_year: Some(2026),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::conflict("duplicate enrollment"));
    }

    #[tokio::test]
    async fn update_with_bad_date_is_a_bad_request() {
        let (registry, _) = registry();
        registry.create(payload("1-9", 2026)).await.unwrap();
        let err = registry
            .update(
                "MAT-26-0001",
                UpdateEnrollment {
                    enrollment_date: Some("soon".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn remove_deletes_only_the_enrollment() {
        let (registry, store) = registry();
        let created = registry.create(payload("1-9", 2026)).await.unwrap();

        registry
            .remove(&created.enrollment.id.to_string())
            .await
            .unwrap();

        let counts = store.row_counts().unwrap();
        assert_eq!(counts.enrollments, 0);
        assert_eq!(counts.students, 1);
        assert_eq!(counts.parents, 2);
    }

    #[tokio::test]
    async fn remove_of_unknown_identifier_is_not_found() {
        let (registry, store) = registry();
        registry.create(payload("1-9", 2026)).await.unwrap();

        let err = registry
            .remove(&EnrollmentId::new().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(store.row_counts().unwrap().enrollments, 1);
    }

    #[tokio::test]
    async fn find_all_is_newest_first() {
        let (registry, _) = registry();
        registry.create(payload("1-9", 2026)).await.unwrap();
        registry.create(payload("2-7", 2026)).await.unwrap();

        let numbers: Vec<_> = registry
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.enrollment.enrollment_number)
            .collect();
        assert_eq!(numbers, vec!["MAT-26-0002", "MAT-26-0001"]);
    }
}
