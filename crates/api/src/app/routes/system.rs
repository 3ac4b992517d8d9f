use axum::Json;

use crate::app::dto::Health;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
