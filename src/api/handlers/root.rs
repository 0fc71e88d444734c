use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ApiStatus {
    message: String,
    status: String,
}

#[utoipa::path(
    get,
    path = "/api/",
    responses((status = 200, description = "Service banner", body = ApiStatus)),
    tag = "health"
)]
pub async fn root() -> Json<ApiStatus> {
    Json(ApiStatus {
        message: "Blessed Belly API".to_string(),
        status: "healthy".to_string(),
    })
}
