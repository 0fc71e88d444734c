//! Password registration and login.

use axum::{Json, extract::Extension};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    password::{hash_password, verify_password},
    state::AuthState,
    types::{LoginRequest, RegisterRequest, TokenResponse},
    utils::{normalize_email, user_response, valid_email},
};
use crate::api::handlers::error::{ApiError, ErrorBody};
use crate::store::{
    DynStore, InsertOutcome, Role, User,
    models::{now_timestamp, prefixed_id},
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Invalid input or email already registered", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(store, auth_state, payload))]
pub async fn register(
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if request.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    let role = if auth_state.config().is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };

    let user = User {
        user_id: prefixed_id("user"),
        email,
        name: request.name.trim().to_string(),
        picture: None,
        password_hash: Some(hash_password(&request.password)?),
        role,
        created_at: now_timestamp(),
    };

    // The unique email index settles concurrent registrations.
    if store.insert_user(&user).await? == InsertOutcome::Conflict {
        debug!("registration rejected: email already registered");
        return Err(ApiError::DuplicateEmail);
    }
    info!(user_id = %user.user_id, role = user.role.as_str(), "user registered");

    let token = auth_state.tokens().issue(&user.user_id)?;
    let user = user_response(&store, &user).await?;
    Ok(Json(TokenResponse { token, user }))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(store, auth_state, payload))]
pub async fn login(
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("Missing payload"));
    };

    let email = normalize_email(&request.email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    // OAuth-only accounts have no password to check.
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(&request.password, stored_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth_state.tokens().issue(&user.user_id)?;
    let user = user_response(&store, &user).await?;
    Ok(Json(TokenResponse { token, user }))
}
