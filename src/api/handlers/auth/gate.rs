//! Authorization gates layered on the session resolver.
//!
//! Each gate re-runs the lookups it needs and has no side effects, so calling
//! one twice in a request is harmless.

use axum::http::HeaderMap;

use super::session::SessionResolver;
use crate::api::handlers::error::ApiError;
use crate::store::{DynStore, Role, User};

#[derive(Clone)]
pub struct AccessGate {
    resolver: SessionResolver,
    store: DynStore,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    #[must_use]
    pub fn new(resolver: SessionResolver, store: DynStore) -> Self {
        Self { resolver, store }
    }

    #[must_use]
    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Any resolvable identity.
    ///
    /// # Errors
    /// [`ApiError::Unauthenticated`] when nothing resolves.
    pub async fn require_auth(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        self.resolver
            .resolve(headers)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }

    /// Authenticated and holding a subscription whose status is exactly `active`.
    ///
    /// # Errors
    /// [`ApiError::Unauthenticated`] or [`ApiError::SubscriptionRequired`].
    pub async fn require_subscription(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let user = self.require_auth(headers).await?;
        let active = self
            .store
            .find_subscription(&user.user_id)
            .await?
            .is_some_and(|subscription| subscription.is_active());
        if active {
            Ok(user)
        } else {
            Err(ApiError::SubscriptionRequired)
        }
    }

    /// Authenticated with the `admin` role.
    ///
    /// # Errors
    /// [`ApiError::Unauthenticated`] or [`ApiError::AdminRequired`].
    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<User, ApiError> {
        let user = self.require_auth(headers).await?;
        if user.role == Role::Admin {
            Ok(user)
        } else {
            Err(ApiError::AdminRequired)
        }
    }
}
