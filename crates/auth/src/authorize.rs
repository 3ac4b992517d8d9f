use serde::Serialize;

use crate::claims::Claims;

/// Statically declared set of role names permitted for an operation.
///
/// An empty set means the operation is open to any authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedRoles {
    roles: &'static [&'static str],
}

impl AllowedRoles {
    pub const OPEN: AllowedRoles = AllowedRoles { roles: &[] };

    pub const fn new(roles: &'static [&'static str]) -> Self {
        Self { roles }
    }

    pub fn is_open(&self) -> bool {
        self.roles.is_empty()
    }

    /// Case-sensitive, verbatim membership test.
    pub fn permits(&self, role: &str) -> bool {
        self.roles.iter().any(|r| *r == role)
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.roles
    }
}

/// Auditable outcome of an access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub reason: String,
    /// Role claimed by the principal, if any principal was present.
    pub principal_role: Option<String>,
    pub allowed_roles: Vec<String>,
}

/// Explain an access decision.
///
/// - No IO
/// - No panics
/// - Fails closed: no claims, or an empty role, never grants a restricted operation
pub fn explain(claims: Option<&Claims>, allowed: &AllowedRoles) -> AccessDecision {
    let allowed_roles: Vec<String> = allowed.names().iter().map(|r| r.to_string()).collect();

    if allowed.is_open() {
        return AccessDecision {
            granted: true,
            reason: "operation declares no roles".to_string(),
            principal_role: claims.map(|c| c.role.clone()),
            allowed_roles,
        };
    }

    let Some(claims) = claims else {
        return AccessDecision {
            granted: false,
            reason: "no authenticated principal".to_string(),
            principal_role: None,
            allowed_roles,
        };
    };

    if !claims.has_role() {
        return AccessDecision {
            granted: false,
            reason: "principal has no role".to_string(),
            principal_role: Some(String::new()),
            allowed_roles,
        };
    }

    let granted = allowed.permits(&claims.role);
    let reason = if granted {
        format!("role '{}' is permitted", claims.role)
    } else {
        format!("role '{}' is not in {:?}", claims.role, allowed_roles)
    };

    AccessDecision {
        granted,
        reason,
        principal_role: Some(claims.role.clone()),
        allowed_roles,
    }
}

/// Decide whether the principal may perform an operation declaring `allowed`.
///
/// Denial and "no claims present" both resolve to `false`; the boundary layer
/// turns `false` into a `Forbidden` response.
pub fn authorize(claims: Option<&Claims>, allowed: &AllowedRoles) -> bool {
    explain(claims, allowed).granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleName;
    use chrono::Utc;
    use matricula_core::UserId;

    const ADMIN: AllowedRoles = AllowedRoles::new(&[RoleName::ADMIN_NAME]);
    const ADMIN_USER: AllowedRoles = AllowedRoles::new(&[RoleName::ADMIN_NAME, RoleName::USER_NAME]);

    fn claims_with_role(role: Option<&str>) -> Claims {
        Claims::new(UserId::new(), "Ana", "ana@example.com", role, Utc::now())
    }

    #[test]
    fn user_denied_on_admin_only_and_allowed_on_admin_user() {
        let user = claims_with_role(Some("User"));
        assert!(!authorize(Some(&user), &ADMIN));
        assert!(authorize(Some(&user), &ADMIN_USER));
    }

    #[test]
    fn no_principal_is_denied_on_restricted_operations() {
        assert!(!authorize(None, &ADMIN));
        assert!(!authorize(None, &ADMIN_USER));
    }

    #[test]
    fn open_operation_allows_anyone() {
        assert!(authorize(None, &AllowedRoles::OPEN));
        assert!(authorize(Some(&claims_with_role(None)), &AllowedRoles::OPEN));
    }

    #[test]
    fn role_match_is_case_sensitive() {
        let admin_lower = claims_with_role(Some("admin"));
        assert!(!authorize(Some(&admin_lower), &ADMIN));
    }

    #[test]
    fn empty_role_is_denied_with_reason() {
        let decision = explain(Some(&claims_with_role(None)), &ADMIN_USER);
        assert!(!decision.granted);
        assert_eq!(decision.reason, "principal has no role");
        assert_eq!(decision.allowed_roles, vec!["Admin", "User"]);
    }
}
