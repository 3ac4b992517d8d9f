use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use matricula_auth::{AccountChanges, NewAccount, Operation};
use matricula_core::UserId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(find_user).post(create_user))
        .route("/:id", patch(update_user))
}

/// POST /users; responds with the profile, never the hash.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::UserCreate) {
        return resp;
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };

    match services.users.create_with_password(body).await {
        Ok(user) => (StatusCode::CREATED, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<AccountChanges>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::UserUpdate) {
        return resp;
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };
    let id = match dto::parse_uuid(&id, "user") {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(resp) => return resp,
    };

    match services.users.update(id, body).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /users?email=
pub async fn find_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::EmailQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::UserRead) {
        return resp;
    }

    match services.users.find_by_email(&query.email).await {
        Ok(user) => (StatusCode::OK, Json(user.profile())).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
