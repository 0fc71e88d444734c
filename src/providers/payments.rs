//! Hosted checkout through the Stripe REST API.
//!
//! Only the three calls the subscription flow needs are modelled: create a
//! checkout session, read its status, and authenticate a webhook delivery.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{Instrument, info_span};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

/// Deliveries older than this are refused.
const WEBHOOK_TOLERANCE_SECONDS: u64 = 300;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub amount: f64,
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStatus {
    pub status: String,
    pub payment_status: String,
    /// Minor currency units.
    pub amount_total: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: String,
    pub payment_status: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook secret not configured")]
    NotConfigured,
    #[error("missing or malformed signature header")]
    MalformedHeader,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("unreadable event payload")]
    Payload,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
    async fn checkout_status(&self, session_id: &str) -> Result<CheckoutStatus>;
    /// Authenticate and decode a webhook body.
    ///
    /// # Errors
    /// Any signature or payload problem.
    fn parse_webhook(&self, payload: &[u8], signature: Option<&str>)
    -> Result<WebhookEvent, WebhookError>;
}

pub struct StripeGateway {
    client: Client,
    api_url: String,
    /// `None` leaves checkout unavailable; calls fail instead of reaching the API.
    api_key: Option<SecretString>,
    webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    #[must_use]
    pub fn new(client: Client, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            api_url: DEFAULT_STRIPE_API_URL.to_string(),
            api_key,
            webhook_secret: None,
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| anyhow!("payment provider API key not configured"))
    }
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Deserialize)]
struct StripeEventData {
    object: StripeSession,
}

/// Form fields for `POST /v1/checkout/sessions`.
fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    #[allow(clippy::cast_possible_truncation)]
    let unit_amount = (request.amount * 100.0).round() as i64;
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.product_name.clone(),
        ),
    ];
    form.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/checkout/sessions", self.api_url);
        let span = info_span!("payments.checkout.create", http.method = "POST", url = %url);
        async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .form(&checkout_form(request))
                .send()
                .await
                .context("checkout session request failed")?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("checkout session creation failed: {status}"));
            }
            let session: StripeSession = response
                .json()
                .await
                .context("invalid checkout session response")?;
            let url = session
                .url
                .ok_or_else(|| anyhow!("checkout session {} has no url", session.id))?;
            Ok(CheckoutSession {
                session_id: session.id,
                url,
            })
        }
        .instrument(span)
        .await
    }

    async fn checkout_status(&self, session_id: &str) -> Result<CheckoutStatus> {
        let api_key = self.api_key()?;
        let url = format!("{}/v1/checkout/sessions/{session_id}", self.api_url);
        let span = info_span!("payments.checkout.status", http.method = "GET", url = %url);
        async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(api_key)
                .send()
                .await
                .context("checkout status request failed")?;
            let status = response.status();
            if !status.is_success() {
                return Err(anyhow!("checkout status lookup failed: {status}"));
            }
            let session: StripeSession = response
                .json()
                .await
                .context("invalid checkout status response")?;
            Ok(CheckoutStatus {
                status: session.status.unwrap_or_default(),
                payment_status: session.payment_status.unwrap_or_default(),
                amount_total: session.amount_total.unwrap_or_default(),
                currency: session.currency.unwrap_or_default(),
                metadata: session.metadata,
            })
        }
        .instrument(span)
        .await
    }

    fn parse_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, WebhookError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(WebhookError::NotConfigured)?;
        let header = signature.ok_or(WebhookError::MalformedHeader)?;
        verify_signature(
            payload,
            header,
            secret.expose_secret(),
            Utc::now().timestamp(),
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|_| WebhookError::Payload)?;
        let object = event.data.object;
        Ok(WebhookEvent {
            event_type: event.event_type,
            session_id: object.id,
            payment_status: object.payment_status.unwrap_or_default(),
            metadata: object.metadata,
        })
    }
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The MAC is HMAC-SHA256 over `"<t>.<payload>"`; any listed `v1` may match.
///
/// # Errors
/// Malformed header, stale timestamp, or no matching signature.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix_seconds: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    if now_unix_seconds.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECONDS {
        return Err(WebhookError::Stale);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok());
    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_714_564_800;

    fn sign(payload: &[u8], timestamp: i64, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn gateway(secret: Option<&str>) -> StripeGateway {
        StripeGateway::new(Client::new(), Some(SecretString::from("sk_test")))
            .with_webhook_secret(secret.map(SecretString::from))
    }

    #[test]
    fn signature_accepts_valid_and_rejects_forged() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let good = sign(payload, NOW, SECRET);
        let header = format!("t={NOW},v1={good}");
        assert_eq!(verify_signature(payload, &header, SECRET, NOW), Ok(()));

        // Rotated secrets: any v1 may match.
        let stale_sig = sign(payload, NOW, "old_secret");
        let header = format!("t={NOW},v1={stale_sig},v1={good}");
        assert_eq!(verify_signature(payload, &header, SECRET, NOW), Ok(()));

        let header = format!("t={NOW},v1={stale_sig}");
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW),
            Err(WebhookError::SignatureMismatch)
        );

        let header = format!("t={NOW},v1={good}");
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn signature_rejects_malformed_and_stale() {
        let payload = b"{}";
        let good = sign(payload, NOW, SECRET);
        for header in ["", "v1=abc", &format!("t=abc,v1={good}"), &format!("t={NOW}")] {
            assert_eq!(
                verify_signature(payload, header, SECRET, NOW),
                Err(WebhookError::MalformedHeader),
                "{header:?}"
            );
        }
        let header = format!("t={NOW},v1={good}");
        let tolerance = i64::try_from(WEBHOOK_TOLERANCE_SECONDS).expect("tolerance fits i64");
        assert_eq!(verify_signature(payload, &header, SECRET, NOW + tolerance), Ok(()));
        assert_eq!(
            verify_signature(payload, &header, SECRET, NOW + tolerance + 1),
            Err(WebhookError::Stale)
        );

        for extreme in [i64::MIN, i64::MAX] {
            let header = format!("t={extreme},v1=00");
            assert_eq!(
                verify_signature(payload, &header, SECRET, NOW),
                Err(WebhookError::Stale),
                "{header:?}"
            );
        }
    }

    #[test]
    fn parse_webhook_requires_secret_and_signature() {
        let payload = b"{}";
        assert_eq!(
            gateway(None).parse_webhook(payload, Some("t=1,v1=00")),
            Err(WebhookError::NotConfigured)
        );
        assert_eq!(
            gateway(Some(SECRET)).parse_webhook(payload, None),
            Err(WebhookError::MalformedHeader)
        );
    }

    #[test]
    fn parse_webhook_decodes_completed_session() {
        let payload = br#"{
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "metadata": {"user_id": "user_abc", "plan": "beta_monthly"}
            }}
        }"#;
        let now = Utc::now().timestamp();
        let header = format!("t={now},v1={}", sign(payload, now, SECRET));
        let event = gateway(Some(SECRET)).parse_webhook(payload, Some(&header));
        let Ok(event) = event else {
            panic!("webhook rejected: {event:?}");
        };
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.session_id, "cs_test_1");
        assert_eq!(event.payment_status, "paid");
        assert_eq!(event.metadata.get("user_id").map(String::as_str), Some("user_abc"));
    }

    #[test]
    fn checkout_form_encodes_minor_units_and_metadata() {
        let request = CheckoutRequest {
            amount: 9.0,
            currency: "usd".to_string(),
            product_name: "Beta".to_string(),
            success_url: "https://app/payment/success".to_string(),
            cancel_url: "https://app/pricing".to_string(),
            metadata: BTreeMap::from([("user_id".to_string(), "user_abc".to_string())]),
        };
        let form = checkout_form(&request);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("900"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("metadata[user_id]"), Some("user_abc"));
        assert_eq!(get("mode"), Some("payment"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let gateway = StripeGateway::new(Client::new(), None)
            .with_api_url("http://127.0.0.1:9".to_string());
        let err = gateway.checkout_status("cs_test").await;
        assert!(err.is_err_and(|err| err.to_string().contains("not configured")));
    }

    #[test]
    fn debug_redacts_keys() {
        let rendered = format!("{:?}", gateway(Some(SECRET)));
        assert!(!rendered.contains("sk_test"));
        assert!(!rendered.contains(SECRET));
    }
}
