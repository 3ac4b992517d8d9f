//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend selection and service assembly
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and path parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router over already-assembled services.
pub fn build_app(services: services::AppServices) -> Router {
    let auth_state = middleware::AuthState {
        tokens: services.tokens.clone(),
    };
    let services = Arc::new(services);

    // Protected routes: the authenticator runs before every handler.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
