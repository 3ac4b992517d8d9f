use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use matricula_core::EnrollmentId;

static UUID_SHAPE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").ok()
});

/// Target of a dual-identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentRef {
    ById(EnrollmentId),
    ByNumber(String),
}

impl EnrollmentRef {
    /// Classify a raw identifier by shape.
    ///
    /// Canonical `8-4-4-4-12` hex strings (any case) resolve by primary key;
    /// anything else is treated as an enrollment number.
    pub fn classify(raw: &str) -> Self {
        let is_uuid_shaped = UUID_SHAPE.as_ref().is_some_and(|re| re.is_match(raw));
        if is_uuid_shaped {
            if let Ok(uuid) = Uuid::parse_str(raw) {
                return EnrollmentRef::ById(EnrollmentId::from_uuid(uuid));
            }
        }
        EnrollmentRef::ByNumber(raw.to_string())
    }
}

impl core::fmt::Display for EnrollmentRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EnrollmentRef::ById(id) => write!(f, "{id}"),
            EnrollmentRef::ByNumber(number) => f.write_str(number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_uuid_resolves_by_id() {
        let id = EnrollmentId::new();
        assert_eq!(
            EnrollmentRef::classify(&id.to_string()),
            EnrollmentRef::ById(id)
        );
    }

    #[test]
    fn uppercase_uuid_resolves_by_id() {
        let id = EnrollmentId::new();
        let upper = id.to_string().to_uppercase();
        assert_eq!(EnrollmentRef::classify(&upper), EnrollmentRef::ById(id));
    }

    #[test]
    fn enrollment_numbers_resolve_by_number() {
        assert_eq!(
            EnrollmentRef::classify("MAT-26-0001"),
            EnrollmentRef::ByNumber("MAT-26-0001".to_string())
        );
    }

    #[test]
    fn non_canonical_uuid_forms_resolve_by_number() {
        let simple = Uuid::new_v4().simple().to_string();
        assert!(matches!(
            EnrollmentRef::classify(&simple),
            EnrollmentRef::ByNumber(_)
        ));

        let braced = format!("{{{}}}", Uuid::new_v4());
        assert!(matches!(
            EnrollmentRef::classify(&braced),
            EnrollmentRef::ByNumber(_)
        ));
    }
}
