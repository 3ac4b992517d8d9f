use matricula_auth::Claims;
use matricula_core::UserId;

/// Authenticated principal of a request, attached by the auth middleware and
/// passed explicitly to the authorization guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: Claims,
}

impl PrincipalContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.sub
    }

    /// Claimed role name; empty when the user has no role.
    pub fn role(&self) -> &str {
        &self.claims.role
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
