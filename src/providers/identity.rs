//! External identity exchange: trades a provider `session_id` for the
//! caller's profile and a session token.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{Instrument, info_span};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub session_token: String,
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("identity provider rejected session: {0}")]
    Rejected(StatusCode),
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityExchange: Send + Sync {
    async fn exchange(&self, session_id: &str) -> Result<ExternalIdentity, ExchangeError>;
}

#[derive(Debug, Clone)]
pub struct HttpIdentityExchange {
    client: Client,
    url: String,
}

impl HttpIdentityExchange {
    #[must_use]
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl IdentityExchange for HttpIdentityExchange {
    async fn exchange(&self, session_id: &str) -> Result<ExternalIdentity, ExchangeError> {
        let span = info_span!(
            "identity.exchange",
            http.method = "GET",
            url = %self.url
        );
        async {
            let response = self
                .client
                .get(&self.url)
                .header("X-Session-ID", session_id)
                .send()
                .await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(ExchangeError::Rejected(status));
            }
            Ok(response.json::<ExternalIdentity>().await?)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_payload_picture_is_optional() -> anyhow::Result<()> {
        let identity: ExternalIdentity = serde_json::from_str(
            r#"{"email":"a@x.com","name":"A","session_token":"tok","id":"ignored"}"#,
        )?;
        assert_eq!(identity.picture, None);
        assert_eq!(identity.session_token, "tok");
        Ok(())
    }

    #[test]
    fn rejected_names_status() {
        let err = ExchangeError::Rejected(StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("404"));
    }
}
