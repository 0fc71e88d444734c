//! Outbound HTTP collaborators.
//!
//! Every provider sits behind a trait so handlers can be exercised with stubs;
//! the HTTP implementations share one `reqwest` client setup with a bounded
//! timeout.

pub mod identity;
pub mod payments;
pub mod text;

use anyhow::{Context, Result};
use reqwest::Client;
use std::{sync::Arc, time::Duration};

pub use identity::{ExchangeError, ExternalIdentity, HttpIdentityExchange, IdentityExchange};
pub use payments::{
    CheckoutRequest, CheckoutSession, CheckoutStatus, PaymentGateway, StripeGateway, WebhookError,
    WebhookEvent,
};
pub use text::{OpenAiTextGenerator, Recommendation, RecommendationPrompt, TextGenerator};

pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// The provider set handed to handlers.
#[derive(Clone)]
pub struct Providers {
    pub identity: Arc<dyn IdentityExchange>,
    pub payments: Arc<dyn PaymentGateway>,
    /// `None` when no text-generation key is configured.
    pub text: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("text_generation", &self.text.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the shared HTTP client for provider calls.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build provider HTTP client")
}
