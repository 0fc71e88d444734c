//! Trigger library: quick-response cards for moments like cravings or stress.

use axum::{
    Json,
    extract::{Extension, Path},
    http::HeaderMap,
};
use std::sync::Arc;

use super::auth::AuthState;
use super::error::{ApiError, ErrorBody};
use crate::store::{DynStore, TriggerCard};

#[utoipa::path(
    get,
    path = "/api/triggers",
    responses(
        (status = 200, description = "All trigger cards", body = [TriggerCard]),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Active subscription required", body = ErrorBody),
    ),
    tag = "triggers"
)]
pub async fn list(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<TriggerCard>>, ApiError> {
    auth_state.gate().require_subscription(&headers).await?;
    Ok(Json(store.list_triggers(None).await?))
}

#[utoipa::path(
    get,
    path = "/api/triggers/{trigger_type}",
    params(("trigger_type" = String, Path, description = "e.g. stressed, cravings, before_bed")),
    responses(
        (status = 200, description = "Trigger cards of one type", body = [TriggerCard]),
        (status = 403, description = "Active subscription required", body = ErrorBody),
        (status = 404, description = "No triggers found", body = ErrorBody),
    ),
    tag = "triggers"
)]
pub async fn by_type(
    headers: HeaderMap,
    Path(trigger_type): Path<String>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<Vec<TriggerCard>>, ApiError> {
    auth_state.gate().require_subscription(&headers).await?;
    let triggers = store.list_triggers(Some(&trigger_type)).await?;
    if triggers.is_empty() {
        return Err(ApiError::not_found("No triggers found"));
    }
    Ok(Json(triggers))
}
