use axum::{routing::get, Router};

pub mod auth;
pub mod enrollments;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/auth", auth::router())
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/enrollments", enrollments::router())
        .nest("/roles", roles::router())
        .nest("/users", users::router())
}
