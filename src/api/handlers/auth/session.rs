//! Session resolution for cookie and bearer credentials, plus logout.
//!
//! Flow Overview: the `session_token` cookie is tried first and, only when it
//! yields nobody, the `Authorization: Bearer` claim. A credential that does
//! not lead to a live user is indistinguishable from no credential at all.

use anyhow::Result;
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use super::{state::AuthState, token::TokenCodec, types::MessageResponse};
use crate::store::{DynStore, User, models::parse_timestamp};

pub const SESSION_COOKIE_NAME: &str = "session_token";

/// Resolves the caller behind a request.
#[derive(Clone)]
pub struct SessionResolver {
    store: DynStore,
    tokens: Arc<TokenCodec>,
}

impl std::fmt::Debug for SessionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionResolver")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl SessionResolver {
    #[must_use]
    pub fn new(store: DynStore, tokens: Arc<TokenCodec>) -> Self {
        Self { store, tokens }
    }

    /// Return the authenticated user, or `None` when neither carrier yields one.
    ///
    /// # Errors
    /// Only store failures are returned; credential problems resolve to `None`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Option<User>> {
        self.resolve_at(headers, Utc::now()).await
    }

    /// [`SessionResolver::resolve`] against an explicit clock.
    ///
    /// # Errors
    /// Only store failures are returned.
    pub async fn resolve_at(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        if let Some(token) = extract_session_cookie(headers) {
            if let Some(user) = self.from_cookie(&token, now).await? {
                return Ok(Some(user));
            }
        }

        if let Some(token) = extract_bearer_token(headers) {
            return self.from_bearer(&token, now).await;
        }

        Ok(None)
    }

    async fn from_cookie(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let Some(session) = self.store.find_session(token).await? else {
            debug!("session cookie has no matching session");
            return Ok(None);
        };
        let Some(expires_at) = parse_timestamp(&session.expires_at) else {
            debug!("session has unreadable expiry");
            return Ok(None);
        };
        if expires_at <= now {
            debug!("session expired");
            return Ok(None);
        }
        self.store.find_user_by_id(&session.user_id).await
    }

    async fn from_bearer(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        match self.tokens.verify_at(token, now) {
            Ok(user_id) => self.store.find_user_by_id(&user_id).await,
            Err(err) => {
                debug!("bearer token rejected: {err}");
                Ok(None)
            }
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session removed and cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, store: Extension<DynStore>) -> impl IntoResponse {
    if let Some(token) = extract_session_cookie(&headers) {
        if let Err(err) = store.delete_session(&token).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    match clear_session_cookie() {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    (
        response_headers,
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// `Set-Cookie` value for a freshly exchanged session.
pub(crate) fn session_cookie(
    auth_state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = auth_state.config().session_ttl_seconds();
    // The frontend is served from another site, so the cookie must be cross-site.
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={ttl_seconds}"
    ))
}

fn clear_session_cookie() -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0"
    ))
}

pub(crate) fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// Only the exact `Bearer ` scheme prefix is accepted.
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
