//! Human-readable enrollment codes: `MAT-YY-NNNN`.

pub const PREFIX: &str = "MAT";

/// Two-digit suffix of an academic year (`2026 -> 26`, `2005 -> 5`, rendered `05`).
pub fn year_suffix(academic_year: i32) -> i32 {
    academic_year.rem_euclid(100)
}

/// Compose the code for the next enrollment of `academic_year`, given how many
/// enrollments that year already holds.
///
/// The sequence is `existing + 1`, zero padded to four digits. Codes are not
/// reserved: two writers reading the same count compose the same code, and
/// the unique index on the code decides which one commits.
pub fn compose(academic_year: i32, existing: u64) -> String {
    format!(
        "{PREFIX}-{:02}-{:04}",
        year_suffix(academic_year),
        existing.saturating_add(1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_enrollment_of_a_year() {
        assert_eq!(compose(2026, 0), "MAT-26-0001");
    }

    #[test]
    fn sequence_follows_existing_count() {
        assert_eq!(compose(2026, 41), "MAT-26-0042");
        assert_eq!(compose(2030, 9998), "MAT-30-9999");
    }

    #[test]
    fn year_suffix_is_zero_padded() {
        assert_eq!(compose(2005, 0), "MAT-05-0001");
        assert_eq!(compose(2100, 0), "MAT-00-0001");
    }

    #[test]
    fn sequence_widens_past_four_digits() {
        assert_eq!(compose(2026, 9999), "MAT-26-10000");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        use crate::lookup::EnrollmentRef;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Codes of one year differ whenever the counts differ.
            #[test]
            fn distinct_counts_give_distinct_codes(
                year in 1900i32..3000,
                a in 0u64..100_000,
                b in 0u64..100_000,
            ) {
                prop_assume!(a != b);
                prop_assert_ne!(compose(year, a), compose(year, b));
            }

            /// A composed code is never mistaken for a primary key.
            #[test]
            fn codes_resolve_by_number(year in 1900i32..3000, existing in 0u64..100_000) {
                let code = compose(year, existing);
                prop_assert!(code.starts_with("MAT-"));
                prop_assert_eq!(&code[4..6], format!("{:02}", year % 100));
                prop_assert_eq!(EnrollmentRef::classify(&code), EnrollmentRef::ByNumber(code.clone()));
            }
        }
    }
}
