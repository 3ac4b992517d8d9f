use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use matricula_auth::{NewRole, Operation};
use matricula_core::RoleId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role))
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewRole>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::RoleCreate) {
        return resp;
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };

    match services.roles.create(body).await {
        Ok(role) => (StatusCode::CREATED, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::RoleList) {
        return resp;
    }

    match services.roles.list().await {
        Ok(roles) => (StatusCode::OK, Json(roles)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::RoleRead) {
        return resp;
    }
    let id = match dto::parse_uuid(&id, "role") {
        Ok(uuid) => RoleId::from_uuid(uuid),
        Err(resp) => return resp,
    };

    match services.roles.get_by_id(id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
