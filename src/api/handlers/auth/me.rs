use axum::{Json, extract::Extension, http::HeaderMap};
use std::sync::Arc;

use super::{state::AuthState, types::UserResponse, utils::user_response};
use crate::api::handlers::error::{ApiError, ErrorBody};
use crate::store::DynStore;

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = auth_state.gate().require_auth(&headers).await?;
    Ok(Json(user_response(&store, &user).await?))
}
