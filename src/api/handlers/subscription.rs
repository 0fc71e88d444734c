//! Subscription status and the single activation path shared by checkout
//! polling and the payment webhook.

use anyhow::Result;
use axum::{Json, extract::Extension, http::HeaderMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::auth::AuthState;
use super::error::{ApiError, ErrorBody};
use crate::store::{DynStore, Subscription, models::{now_timestamp, prefixed_id}};

pub const BETA_PLAN: &str = "beta_monthly";
pub const BETA_PRICE: f64 = 9.0;
pub const BETA_CURRENCY: &str = "usd";

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct SubscriptionStatusResponse {
    pub has_subscription: bool,
    pub subscription: Option<Subscription>,
}

#[utoipa::path(
    get,
    path = "/api/subscription/status",
    responses(
        (status = 200, description = "Current subscription, if any", body = SubscriptionStatusResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
    ),
    tag = "subscription"
)]
pub async fn status(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<SubscriptionStatusResponse>, ApiError> {
    let user = auth_state.gate().require_auth(&headers).await?;
    let subscription = store.find_subscription(&user.user_id).await?;
    Ok(Json(SubscriptionStatusResponse {
        has_subscription: subscription.as_ref().is_some_and(Subscription::is_active),
        subscription,
    }))
}

/// Replace the user's subscription with an active beta plan.
///
/// # Errors
/// Returns an error if the store write fails.
pub async fn activate(store: &DynStore, user_id: &str) -> Result<()> {
    let now = now_timestamp();
    let subscription = Subscription {
        subscription_id: prefixed_id("sub"),
        user_id: user_id.to_string(),
        plan: BETA_PLAN.to_string(),
        status: "active".to_string(),
        amount: BETA_PRICE,
        started_at: now.clone(),
        updated_at: now,
    };
    store.upsert_subscription(&subscription).await?;
    info!(user_id, "subscription activated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialStore, MemoryStore};

    #[tokio::test]
    async fn activate_replaces_previous_subscription() -> anyhow::Result<()> {
        let memory = Arc::new(MemoryStore::new());
        let store: DynStore = memory.clone();

        activate(&store, "user_1").await?;
        let first = memory.find_subscription("user_1").await?;
        activate(&store, "user_1").await?;
        let second = memory.find_subscription("user_1").await?;

        let (Some(first), Some(second)) = (first, second) else {
            anyhow::bail!("subscription missing");
        };
        assert!(second.is_active());
        assert_eq!(second.plan, BETA_PLAN);
        assert!((second.amount - BETA_PRICE).abs() < f64::EPSILON);
        assert_ne!(first.subscription_id, second.subscription_id);
        Ok(())
    }
}
