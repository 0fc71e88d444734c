//! OAuth exchange: trade an identity-provider `session_id` for a local session.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    session::session_cookie,
    state::AuthState,
    types::{OAuthSessionRequest, OAuthSessionResponse},
    utils::{normalize_email, user_response},
};
use crate::api::handlers::error::{ApiError, ErrorBody};
use crate::providers::{ExchangeError, ExternalIdentity, Providers};
use crate::store::{
    DynStore, InsertOutcome, Role, SessionRecord, User,
    models::{format_timestamp, now_timestamp, prefixed_id},
};

#[utoipa::path(
    post,
    path = "/api/auth/google/session",
    request_body = OAuthSessionRequest,
    responses(
        (status = 200, description = "Session established, cookie set", body = OAuthSessionResponse),
        (status = 400, description = "session_id missing", body = ErrorBody),
        (status = 401, description = "Identity provider rejected the session", body = ErrorBody),
        (status = 502, description = "Identity provider unavailable", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(store, auth_state, providers, payload))]
pub async fn google_session(
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    providers: Extension<Providers>,
    payload: Option<Json<OAuthSessionRequest>>,
) -> Result<(HeaderMap, Json<OAuthSessionResponse>), ApiError> {
    let session_id = payload
        .and_then(|Json(request)| request.session_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("session_id required"))?;

    let identity = match providers.identity.exchange(&session_id).await {
        Ok(identity) => identity,
        Err(ExchangeError::Rejected(status)) => {
            warn!("identity exchange rejected: {status}");
            return Err(ApiError::InvalidExternalSession);
        }
        Err(err @ ExchangeError::Transport(_)) => {
            error!("identity exchange failed: {err}");
            return Err(ApiError::BadGateway(
                "Identity provider unavailable".to_string(),
            ));
        }
    };

    let user = find_or_create_user(&store, &auth_state, &identity).await?;

    // Every exchange adds a session row; earlier ones stay valid until expiry.
    let now = Utc::now();
    let expires_at =
        session_expiry(now, auth_state.config().session_ttl_seconds()).ok_or_else(|| {
            error!("session TTL out of range");
            ApiError::Internal
        })?;
    let session = SessionRecord {
        user_id: user.user_id.clone(),
        session_token: identity.session_token.clone(),
        expires_at: format_timestamp(expires_at),
        created_at: format_timestamp(now),
    };
    store.insert_session(&session).await?;
    info!(user_id = %user.user_id, "external session established");

    let mut headers = HeaderMap::new();
    let cookie = session_cookie(&auth_state, &identity.session_token).map_err(|err| {
        ApiError::from(anyhow::anyhow!("invalid session token from provider: {err}"))
    })?;
    headers.insert(SET_COOKIE, cookie);

    let user = user_response(&store, &user).await?;
    Ok((headers, Json(OAuthSessionResponse { user })))
}

/// Existing users get their display fields refreshed; new users get a role
/// from the admin allow-list.
async fn find_or_create_user(
    store: &DynStore,
    auth_state: &AuthState,
    identity: &ExternalIdentity,
) -> Result<User, ApiError> {
    let email = normalize_email(&identity.email);

    if let Some(mut user) = store.find_user_by_email(&email).await? {
        store
            .update_user_profile(&user.user_id, &identity.name, identity.picture.as_deref())
            .await?;
        user.name.clone_from(&identity.name);
        user.picture.clone_from(&identity.picture);
        return Ok(user);
    }

    let role = if auth_state.config().is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let user = User {
        user_id: prefixed_id("user"),
        email: email.clone(),
        name: identity.name.clone(),
        picture: identity.picture.clone(),
        password_hash: None,
        role,
        created_at: now_timestamp(),
    };

    match store.insert_user(&user).await? {
        InsertOutcome::Created => {
            info!(
                user_id = %user.user_id,
                role = user.role.as_str(),
                "user created from external identity"
            );
            Ok(user)
        }
        // Lost a race with a concurrent exchange for the same email.
        InsertOutcome::Conflict => store
            .find_user_by_email(&email)
            .await?
            .ok_or(ApiError::Internal),
    }
}

fn session_expiry(now: DateTime<Utc>, ttl_seconds: i64) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::try_seconds(ttl_seconds)?)
}
