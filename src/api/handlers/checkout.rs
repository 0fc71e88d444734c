//! Hosted checkout for the beta plan and the payment webhook.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::auth::AuthState;
use super::error::{ApiError, ErrorBody};
use super::subscription::{self, BETA_CURRENCY, BETA_PLAN, BETA_PRICE};
use crate::providers::{CheckoutRequest, Providers, WebhookEvent};
use crate::store::{
    DynStore, PaymentTransaction,
    models::{now_timestamp, prefixed_id},
};

const PRODUCT_NAME: &str = "Blessed Belly Beta Membership";
const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Deserialize, ToSchema)]
pub struct CheckoutSessionRequest {
    pub origin_url: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CheckoutSessionResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct CheckoutStatusResponse {
    pub status: String,
    pub payment_status: String,
    pub amount_total: i64,
    pub currency: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

#[utoipa::path(
    post,
    path = "/api/checkout/session",
    request_body = CheckoutSessionRequest,
    responses(
        (status = 200, description = "Hosted checkout created", body = CheckoutSessionResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 502, description = "Payment provider unavailable", body = ErrorBody),
    ),
    tag = "subscription"
)]
#[instrument(skip(headers, store, auth_state, providers, payload))]
pub async fn create_session(
    headers: HeaderMap,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    providers: Extension<Providers>,
    payload: Option<Json<CheckoutSessionRequest>>,
) -> Result<Json<CheckoutSessionResponse>, ApiError> {
    let user = auth_state.gate().require_auth(&headers).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::bad_request("origin_url required"));
    };
    let origin = request.origin_url.trim().trim_end_matches('/');
    if origin.is_empty() {
        return Err(ApiError::bad_request("origin_url required"));
    }

    let checkout = CheckoutRequest {
        amount: BETA_PRICE,
        currency: BETA_CURRENCY.to_string(),
        product_name: PRODUCT_NAME.to_string(),
        success_url: format!("{origin}/payment/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{origin}/pricing"),
        metadata: BTreeMap::from([
            ("user_id".to_string(), user.user_id.clone()),
            ("user_email".to_string(), user.email.clone()),
            ("plan".to_string(), BETA_PLAN.to_string()),
        ]),
    };

    let session = providers
        .payments
        .create_checkout_session(&checkout)
        .await
        .map_err(|err| {
            error!("Failed to create checkout session: {err:#}");
            ApiError::BadGateway("Payment provider unavailable".to_string())
        })?;

    store
        .insert_transaction(&PaymentTransaction {
            transaction_id: prefixed_id("txn"),
            session_id: session.session_id.clone(),
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            amount: BETA_PRICE,
            currency: BETA_CURRENCY.to_string(),
            plan: BETA_PLAN.to_string(),
            payment_status: "pending".to_string(),
            status: None,
            created_at: now_timestamp(),
            updated_at: None,
        })
        .await?;
    info!(user_id = %user.user_id, session_id = %session.session_id, "checkout session created");

    Ok(Json(CheckoutSessionResponse {
        url: session.url,
        session_id: session.session_id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/checkout/status/{session_id}",
    params(("session_id" = String, Path, description = "Checkout session id")),
    responses(
        (status = 200, description = "Provider-reported status", body = CheckoutStatusResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 404, description = "Session belongs to another user", body = ErrorBody),
        (status = 502, description = "Payment provider unavailable", body = ErrorBody),
    ),
    tag = "subscription"
)]
#[instrument(skip(headers, store, auth_state, providers))]
pub async fn status(
    headers: HeaderMap,
    Path(session_id): Path<String>,
    store: Extension<DynStore>,
    auth_state: Extension<Arc<AuthState>>,
    providers: Extension<Providers>,
) -> Result<Json<CheckoutStatusResponse>, ApiError> {
    let user = auth_state.gate().require_auth(&headers).await?;

    let transaction = store.find_transaction(&session_id).await?;
    if transaction
        .as_ref()
        .is_some_and(|transaction| transaction.user_id != user.user_id)
    {
        warn!(user_id = %user.user_id, "checkout status requested for another user's session");
        return Err(ApiError::not_found("Checkout session not found"));
    }

    let checkout = providers
        .payments
        .checkout_status(&session_id)
        .await
        .map_err(|err| {
            error!("Failed to read checkout status: {err:#}");
            ApiError::BadGateway("Payment provider unavailable".to_string())
        })?;

    let payer = transaction
        .filter(|transaction| transaction.payment_status != "paid")
        .map(|transaction| transaction.user_id);
    if let (Some(payer), "paid") = (payer, checkout.payment_status.as_str()) {
        store
            .update_transaction_status(&session_id, &checkout.payment_status, &checkout.status)
            .await?;
        subscription::activate(&store, &payer).await?;
    }

    Ok(Json(CheckoutStatusResponse {
        status: checkout.status,
        payment_status: checkout.payment_status,
        amount_total: checkout.amount_total,
        currency: checkout.currency,
    }))
}

#[utoipa::path(
    post,
    path = "/api/webhook/stripe",
    request_body(content = String, description = "Raw provider event", content_type = "application/json"),
    responses(
        (status = 200, description = "Always acknowledged", body = WebhookAck),
    ),
    tag = "subscription"
)]
pub async fn webhook(
    headers: HeaderMap,
    store: Extension<DynStore>,
    providers: Extension<Providers>,
    body: Bytes,
) -> Json<WebhookAck> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match providers.payments.parse_webhook(&body, signature) {
        Ok(event) => {
            if let Err(err) = apply_webhook(&store, &event).await {
                error!("Webhook error: {err:#}");
            }
        }
        Err(err) => warn!("Webhook rejected: {err}"),
    }

    // Acknowledge regardless so the provider does not retry.
    Json(WebhookAck { received: true })
}

async fn apply_webhook(store: &DynStore, event: &WebhookEvent) -> anyhow::Result<()> {
    if event.event_type != "checkout.session.completed" || event.payment_status != "paid" {
        return Ok(());
    }
    let Some(user_id) = event.metadata.get("user_id") else {
        warn!(session_id = %event.session_id, "paid event without user_id metadata");
        return Ok(());
    };
    info!(
        user_id = %user_id,
        event_type = %event.event_type,
        "payment confirmed by webhook"
    );
    subscription::activate(store, user_id).await
}
