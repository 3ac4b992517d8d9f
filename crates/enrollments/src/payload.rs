//! Inbound payloads for the aggregate write path.
//!
//! Payloads arrive pre-validated for shape; dates stay as ISO strings and are
//! parsed inside the write path so a bad date aborts the whole transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use matricula_core::{
    AuthorizedPersonId, EnrollmentId, FamilyInformationId, ParentId, RepresentativeId, StudentId,
    UserId,
};

use crate::date::parse_iso_date;
use crate::error::ModelError;
use crate::kinds::{EnrollmentStatus, Gender, ParentType, Priority};
use crate::model::{
    AuthorizedPerson, Enrollment, EnrollmentChanges, FamilyInformation, Household, Parent,
    Representative, Student,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub names: String,
    pub last_names: String,
    pub rut: String,
    pub birth_date: String,
    pub nationality: String,
    pub current_address: String,
    #[serde(default)]
    pub commune: Option<String>,
    pub gender: Gender,
    #[serde(default)]
    pub prevision: Option<String>,
    #[serde(default)]
    pub medical_conditions: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medications: Option<String>,
    #[serde(default)]
    pub special_needs: Option<String>,
}

impl NewStudent {
    pub fn into_student(self, now: DateTime<Utc>) -> Result<Student, ModelError> {
        let birth_date = parse_iso_date(&self.birth_date)?;
        Ok(Student {
            id: StudentId::new(),
            names: self.names,
            last_names: self.last_names,
            rut: self.rut,
            birth_date,
            nationality: self.nationality,
            current_address: self.current_address,
            commune: self.commune,
            gender: self.gender,
            prevision: self.prevision,
            medical_conditions: self.medical_conditions,
            allergies: self.allergies,
            medications: self.medications,
            special_needs: self.special_needs,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParent {
    pub parent_type: ParentType,
    pub names: String,
    pub last_names: String,
    #[serde(default)]
    pub rut: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewParent {
    pub fn into_parent(self, student_id: StudentId, now: DateTime<Utc>) -> Parent {
        Parent {
            id: ParentId::new(),
            student_id,
            parent_type: self.parent_type,
            names: self.names,
            last_names: self.last_names,
            rut: self.rut,
            nationality: self.nationality,
            occupation: self.occupation,
            education_level: self.education_level,
            workplace: self.workplace,
            phone: self.phone,
            email: self.email,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRepresentative {
    pub names: String,
    pub last_names: String,
    pub rut: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub commune: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub workplace: Option<String>,
    #[serde(default)]
    pub workplace_phone: Option<String>,
    #[serde(default)]
    pub workplace_address: Option<String>,
}

impl NewRepresentative {
    pub fn into_representative(self, student_id: StudentId, now: DateTime<Utc>) -> Representative {
        Representative {
            id: RepresentativeId::new(),
            student_id,
            names: self.names,
            last_names: self.last_names,
            rut: self.rut,
            relationship: self.relationship,
            address: self.address,
            commune: self.commune,
            phone: self.phone,
            mobile_phone: self.mobile_phone,
            email: self.email,
            occupation: self.occupation,
            education_level: self.education_level,
            workplace: self.workplace,
            workplace_phone: self.workplace_phone,
            workplace_address: self.workplace_address,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Household {
    pub fn into_family_information(
        self,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> FamilyInformation {
        FamilyInformation {
            id: FamilyInformationId::new(),
            student_id,
            household: self,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_authorized_person(
        self,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> AuthorizedPerson {
        AuthorizedPerson {
            id: AuthorizedPersonId::new(),
            student_id,
            household: self,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Full creation payload: the student, its owned records and the enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollment {
    pub student: NewStudent,
    #[serde(default)]
    pub parents: Vec<NewParent>,
    #[serde(default)]
    pub family_information: Option<Household>,
    #[serde(default)]
    pub authorized_person: Option<Household>,
    #[serde(default)]
    pub representative: Option<NewRepresentative>,
    pub academic_year: i32,
    pub grade_level: String,
    #[serde(default)]
    pub requires_junaeb: bool,
    #[serde(default)]
    pub requires_transport: bool,
    #[serde(default)]
    pub requires_extended_hours: bool,
    #[serde(default)]
    pub junaeb_priority: Option<Priority>,
    #[serde(default)]
    pub transport_priority: Option<Priority>,
    #[serde(default)]
    pub extended_hours_priority: Option<Priority>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub registered_by_user_id: Option<UserId>,
    pub enrollment_date: String,
}

/// Enrollment-row fields of a [`CreateEnrollment`], split off from the child records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentFields {
    pub academic_year: i32,
    pub grade_level: String,
    pub requires_junaeb: bool,
    pub requires_transport: bool,
    pub requires_extended_hours: bool,
    pub junaeb_priority: Option<Priority>,
    pub transport_priority: Option<Priority>,
    pub extended_hours_priority: Option<Priority>,
    pub observations: Option<String>,
    pub registered_by_user_id: Option<UserId>,
    pub enrollment_date: String,
}

/// Child records of a [`CreateEnrollment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateParts {
    pub student: NewStudent,
    pub parents: Vec<NewParent>,
    pub family_information: Option<Household>,
    pub authorized_person: Option<Household>,
    pub representative: Option<NewRepresentative>,
}

impl CreateEnrollment {
    pub fn split(self) -> (AggregateParts, EnrollmentFields) {
        (
            AggregateParts {
                student: self.student,
                parents: self.parents,
                family_information: self.family_information,
                authorized_person: self.authorized_person,
                representative: self.representative,
            },
            EnrollmentFields {
                academic_year: self.academic_year,
                grade_level: self.grade_level,
                requires_junaeb: self.requires_junaeb,
                requires_transport: self.requires_transport,
                requires_extended_hours: self.requires_extended_hours,
                junaeb_priority: self.junaeb_priority,
                transport_priority: self.transport_priority,
                extended_hours_priority: self.extended_hours_priority,
                observations: self.observations,
                registered_by_user_id: self.registered_by_user_id,
                enrollment_date: self.enrollment_date,
            },
        )
    }
}

impl EnrollmentFields {
    pub fn into_enrollment(
        self,
        enrollment_number: String,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ModelError> {
        let enrollment_date = parse_iso_date(&self.enrollment_date)?;
        Ok(Enrollment {
            id: EnrollmentId::new(),
            enrollment_number,
            student_id,
            academic_year: self.academic_year,
            grade_level: self.grade_level,
            requires_junaeb: self.requires_junaeb,
            requires_transport: self.requires_transport,
            requires_extended_hours: self.requires_extended_hours,
            junaeb_priority: self.junaeb_priority,
            transport_priority: self.transport_priority,
            extended_hours_priority: self.extended_hours_priority,
            observations: self.observations,
            registered_by_user_id: self.registered_by_user_id,
            status: EnrollmentStatus::default(),
            enrollment_date,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update payload. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateEnrollment {
    pub academic_year: Option<i32>,
    pub grade_level: Option<String>,
    pub requires_junaeb: Option<bool>,
    pub requires_transport: Option<bool>,
    pub requires_extended_hours: Option<bool>,
    pub junaeb_priority: Option<Priority>,
    pub transport_priority: Option<Priority>,
    pub extended_hours_priority: Option<Priority>,
    pub observations: Option<String>,
    pub status: Option<EnrollmentStatus>,
    pub enrollment_date: Option<String>,
}

impl UpdateEnrollment {
    /// Parse the enrollment date, if present, and produce the changes to merge.
    pub fn into_changes(self) -> Result<EnrollmentChanges, ModelError> {
        let enrollment_date = self
            .enrollment_date
            .as_deref()
            .map(parse_iso_date)
            .transpose()?;
        Ok(EnrollmentChanges {
            academic_year: self.academic_year,
            grade_level: self.grade_level,
            requires_junaeb: self.requires_junaeb,
            requires_transport: self.requires_transport,
            requires_extended_hours: self.requires_extended_hours,
            junaeb_priority: self.junaeb_priority,
            transport_priority: self.transport_priority,
            extended_hours_priority: self.extended_hours_priority,
            observations: self.observations,
            status: self.status,
            enrollment_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const PAYLOAD: &str = r#"{
        "student": {
            "names": "Sofía",
            "lastNames": "Pérez Soto",
            "rut": "21.345.678-9",
            "birthDate": "2019-05-02",
            "nationality": "Chilena",
            "currentAddress": "Av. Siempre Viva 123",
            "gender": "Femenino"
        },
        "parents": [
            { "parentType": "MADRE", "names": "Carla", "lastNames": "Soto" },
            { "parentType": "PADRE", "names": "Luis", "lastNames": "Pérez" }
        ],
        "familyInformation": { "householdHead": "AMBOS", "monthlyIncome": "Entre $200.001 y $300.000" },
        "academicYear": 2026,
        "gradeLevel": "1° Básico",
        "requiresTransport": true,
        "transportPriority": "BAJA",
        "enrollmentDate": "2026-03-01"
    }"#;

    #[test]
    fn creation_payload_deserializes_with_defaults() {
        let payload: CreateEnrollment = serde_json::from_str(PAYLOAD).unwrap();
        assert_eq!(payload.parents.len(), 2);
        assert!(payload.authorized_person.is_none());
        assert!(!payload.requires_junaeb);
        assert!(payload.requires_transport);
        assert_eq!(payload.transport_priority, Some(Priority::Low));
        assert_eq!(
            payload.family_information.unwrap().household_head,
            Some(crate::kinds::HouseholdHead::Both)
        );
    }

    #[test]
    fn enrollment_starts_active_with_parsed_date() {
        let payload: CreateEnrollment = serde_json::from_str(PAYLOAD).unwrap();
        let (_, fields) = payload.split();
        let enrollment = fields
            .into_enrollment("MAT-26-0001".to_string(), StudentId::new(), Utc::now())
            .unwrap();

        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(
            enrollment.enrollment_date,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn bad_birth_date_fails_student_construction() {
        let mut payload: CreateEnrollment = serde_json::from_str(PAYLOAD).unwrap();
        payload.student.birth_date = "yesterday".to_string();
        assert_eq!(
            payload.student.into_student(Utc::now()).unwrap_err(),
            ModelError::InvalidDate("yesterday".to_string())
        );
    }

    #[test]
    fn update_parses_enrollment_date_only_when_present() {
        let changes = UpdateEnrollment {
            observations: Some("x".to_string()),
            ..Default::default()
        }
        .into_changes()
        .unwrap();
        assert_eq!(changes.enrollment_date, None);
        assert_eq!(changes.observations.as_deref(), Some("x"));

        let changes: EnrollmentChanges =
            serde_json::from_str::<UpdateEnrollment>(r#"{"enrollmentDate":"2026-04-15"}"#)
                .unwrap()
                .into_changes()
                .unwrap();
        assert_eq!(
            changes.enrollment_date,
            NaiveDate::from_ymd_opt(2026, 4, 15)
        );
    }
}
