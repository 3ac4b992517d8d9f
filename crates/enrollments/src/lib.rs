//! `matricula-enrollments` — the student enrollment aggregate.
//!
//! Pure data model and rules, no IO: rows of the aggregate, creation and
//! update payloads, the enrollment-number format and dual-identifier
//! classification. Persistence lives in `matricula-infra`.

pub mod date;
pub mod error;
pub mod kinds;
pub mod lookup;
pub mod model;
pub mod number;
pub mod payload;

pub use date::parse_iso_date;
pub use error::ModelError;
pub use kinds::{
    EnrollmentStatus, Gender, HouseholdHead, HousingType, MonthlyIncome, ParentType, Priority,
};
pub use lookup::EnrollmentRef;
pub use model::{
    AuthorizedPerson, Enrollment, EnrollmentChanges, EnrollmentDetails, FamilyInformation,
    Household, Parent, Representative, Student, StudentDetails,
};
pub use payload::{
    AggregateParts, CreateEnrollment, EnrollmentFields, NewParent, NewRepresentative, NewStudent,
    UpdateEnrollment,
};
