//! Stored rows of the enrollment aggregate.
//!
//! Every row carries its own id and `created_at`/`updated_at`; timestamps are
//! set by the store path and never accepted as input.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use matricula_core::{
    AuthorizedPersonId, EnrollmentId, Entity, FamilyInformationId, ParentId, RepresentativeId,
    StudentId, UserId,
};

use crate::kinds::{
    EnrollmentStatus, Gender, HouseholdHead, HousingType, MonthlyIncome, ParentType, Priority,
};

/// Aggregate root. `rut` is globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub names: String,
    pub last_names: String,
    pub rut: String,
    pub birth_date: NaiveDate,
    pub nationality: String,
    pub current_address: String,
    pub commune: Option<String>,
    pub gender: Gender,
    pub prevision: Option<String>,
    pub medical_conditions: Option<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub special_needs: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parent {
    pub id: ParentId,
    pub student_id: StudentId,
    pub parent_type: ParentType,
    pub names: String,
    pub last_names: String,
    pub rut: Option<String>,
    pub nationality: Option<String>,
    pub occupation: Option<String>,
    pub education_level: Option<String>,
    pub workplace: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Household socioeconomic record.
///
/// Shared by [`FamilyInformation`] and [`AuthorizedPerson`], which capture the
/// same data but remain separate entities with separate tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Household {
    pub household_head: Option<HouseholdHead>,
    pub household_head_other: Option<String>,
    pub monthly_income: Option<MonthlyIncome>,
    pub social_program_chile_solidario: bool,
    pub social_program_puente: bool,
    pub social_program_suf: bool,
    pub social_program_other: Option<String>,
    pub housing_type: Option<HousingType>,
    pub housing_structure: Option<String>,
    pub has_drinking_water: bool,
    pub has_electricity: bool,
    pub bedrooms_count: Option<i32>,
    pub residents_count: Option<i32>,
    pub cas_index: Option<String>,
}

/// 1:1 with [`Student`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInformation {
    pub id: FamilyInformationId,
    pub student_id: StudentId,
    #[serde(flatten)]
    pub household: Household,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Person authorized for pickup; 1:1 with [`Student`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedPerson {
    pub id: AuthorizedPersonId,
    pub student_id: StudentId,
    #[serde(flatten)]
    pub household: Household,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Legal representative; 1:1 with [`Student`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Representative {
    pub id: RepresentativeId,
    pub student_id: StudentId,
    pub names: String,
    pub last_names: String,
    pub rut: String,
    pub relationship: Option<String>,
    pub address: Option<String>,
    pub commune: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub email: Option<String>,
    pub occupation: Option<String>,
    pub education_level: Option<String>,
    pub workplace: Option<String>,
    pub workplace_phone: Option<String>,
    pub workplace_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One enrollment of a student in an academic year.
///
/// Unique on `enrollment_number` and on `(student_id, academic_year)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub enrollment_number: String,
    pub student_id: StudentId,
    pub academic_year: i32,
    pub grade_level: String,
    pub requires_junaeb: bool,
    pub requires_transport: bool,
    pub requires_extended_hours: bool,
    pub junaeb_priority: Option<Priority>,
    pub transport_priority: Option<Priority>,
    pub extended_hours_priority: Option<Priority>,
    pub observations: Option<String>,
    /// Weak reference: deleting the user nulls it.
    pub registered_by_user_id: Option<UserId>,
    pub status: EnrollmentStatus,
    pub enrollment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Merge a partial update; fields left as `None` are untouched.
    pub fn apply(&mut self, changes: &EnrollmentChanges, now: DateTime<Utc>) {
        if let Some(year) = changes.academic_year {
            self.academic_year = year;
        }
        if let Some(grade) = &changes.grade_level {
            self.grade_level = grade.clone();
        }
        if let Some(v) = changes.requires_junaeb {
            self.requires_junaeb = v;
        }
        if let Some(v) = changes.requires_transport {
            self.requires_transport = v;
        }
        if let Some(v) = changes.requires_extended_hours {
            self.requires_extended_hours = v;
        }
        if let Some(p) = changes.junaeb_priority {
            self.junaeb_priority = Some(p);
        }
        if let Some(p) = changes.transport_priority {
            self.transport_priority = Some(p);
        }
        if let Some(p) = changes.extended_hours_priority {
            self.extended_hours_priority = Some(p);
        }
        if let Some(obs) = &changes.observations {
            self.observations = Some(obs.clone());
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(date) = changes.enrollment_date {
            self.enrollment_date = date;
        }
        self.updated_at = now;
    }
}

/// Validated partial update of an [`Enrollment`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrollmentChanges {
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
    pub enrollment_date: Option<NaiveDate>,
}

macro_rules! impl_entity {
    ($($ty:ty => $id:ty),+ $(,)?) => {
        $(
            impl Entity for $ty {
                type Id = $id;

                fn id(&self) -> $id {
                    self.id
                }
            }
        )+
    };
}

impl_entity! {
    Student => StudentId,
    Parent => ParentId,
    FamilyInformation => FamilyInformationId,
    AuthorizedPerson => AuthorizedPersonId,
    Representative => RepresentativeId,
    Enrollment => EnrollmentId,
}

/// Student with all owned child records loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetails {
    #[serde(flatten)]
    pub student: Student,
    pub parents: Vec<Parent>,
    pub family_information: Option<FamilyInformation>,
    pub authorized_person: Option<AuthorizedPerson>,
    pub representative: Option<Representative>,
}

/// Enrollment with its student eagerly loaded; the read shape of the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDetails {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub student: StudentDetails,
}
