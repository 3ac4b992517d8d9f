//! Enrollment-number allocation.
//!
//! Count-then-insert: the next number is the count of enrollments already
//! visible to the transaction for the year, plus one. Two transactions racing
//! on the same year can compute the same number; the unique constraint on
//! `enrollment_number` rejects the second commit.

use matricula_enrollments::number;

use crate::error::StoreError;
use crate::store::EnrollmentTx;

/// Next `MAT-YY-NNNN` number for `academic_year`, read inside `tx`.
pub async fn next_enrollment_number<T>(tx: &mut T, academic_year: i32) -> Result<String, StoreError>
where
    T: EnrollmentTx + ?Sized,
{
    let existing = tx.count_enrollments_for_year(academic_year).await?;
    Ok(number::compose(academic_year, existing))
}
