//! Per-operation authorization guard.
//!
//! Handlers call [`guard`] with the explicit principal context and the
//! operation they implement; the allowed roles come from the static table in
//! `matricula_auth::Operation`.

use axum::http::StatusCode;
use axum::response::Response;
use tracing::warn;

use matricula_auth::{Operation, explain};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// `Ok(())` when the principal may perform `operation`, else a 403 response.
pub fn guard(principal: Option<&PrincipalContext>, operation: Operation) -> Result<(), Response> {
    let decision = explain(
        principal.map(PrincipalContext::claims),
        &operation.allowed_roles(),
    );
    if decision.granted {
        return Ok(());
    }

    warn!(
        operation = %operation,
        role = ?decision.principal_role,
        reason = %decision.reason,
        "access denied"
    );
    Err(json_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        format!("role not permitted for {operation}"),
    ))
}
