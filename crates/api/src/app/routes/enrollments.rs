use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::info;

use matricula_auth::Operation;
use matricula_enrollments::{CreateEnrollment, UpdateEnrollment};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_enrollments).post(create_enrollment))
        .route(
            "/:id",
            get(get_enrollment)
                .patch(update_enrollment)
                .delete(delete_enrollment),
        )
        .route("/number/:enrollment_number", get(get_by_number))
}

pub async fn create_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateEnrollment>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentCreate) {
        return resp;
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };

    info!(
        user_id = %principal.user_id(),
        role = principal.role(),
        academic_year = body.academic_year,
        "creating enrollment"
    );
    match services.enrollments.create(body).await {
        Ok(details) => (StatusCode::CREATED, Json(details)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_enrollments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentList) {
        return resp;
    }

    match services.enrollments.find_all().await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /enrollments/:id, where `id` is a UUID or an enrollment number.
pub async fn get_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentRead) {
        return resp;
    }

    match services.enrollments.find_one(&id).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_by_number(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(enrollment_number): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentRead) {
        return resp;
    }

    match services
        .enrollments
        .find_by_enrollment_number(&enrollment_number)
        .await
    {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateEnrollment>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentUpdate) {
        return resp;
    }
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection.into_response(),
    };

    match services.enrollments.update(&id, body).await {
        Ok(details) => (StatusCode::OK, Json(details)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_enrollment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::guard(Some(&principal), Operation::EnrollmentDelete) {
        return resp;
    }

    match services.enrollments.remove(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
