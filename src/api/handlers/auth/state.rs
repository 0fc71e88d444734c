//! Auth configuration and the shared state handed to handlers.

use secrecy::SecretString;
use std::sync::Arc;

use super::{
    gate::AccessGate,
    session::SessionResolver,
    token::{DEFAULT_TOKEN_TTL_SECONDS, TokenCodec},
};
use crate::store::DynStore;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@blessedbelly.com";
pub const DEFAULT_FRONTEND_BASE_URL: &str = "https://blessedbelly.com";
pub const DEFAULT_OAUTH_SESSION_URL: &str =
    "https://demobackend.emergentagent.com/auth/v1/env/oauth/session-data";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    oauth_session_url: String,
    admin_emails: Vec<String>,
    token_ttl_seconds: i64,
    session_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            oauth_session_url: DEFAULT_OAUTH_SESSION_URL.to_string(),
            admin_emails: vec![DEFAULT_ADMIN_EMAIL.to_string()],
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_oauth_session_url(mut self, url: String) -> Self {
        self.oauth_session_url = url;
        self
    }

    /// Replace the admin allow-list. Entries are trimmed and lowercased to
    /// match how registration normalizes emails; blanks are dropped.
    #[must_use]
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|email| email.as_ref().trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn oauth_session_url(&self) -> &str {
        &self.oauth_session_url
    }

    #[must_use]
    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }

    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin == email)
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}

/// Immutable auth context built once at startup.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    tokens: Arc<TokenCodec>,
    gate: AccessGate,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, jwt_secret: SecretString, store: DynStore) -> Self {
        let tokens =
            Arc::new(TokenCodec::new(jwt_secret).with_ttl_seconds(config.token_ttl_seconds()));
        let resolver = SessionResolver::new(store.clone(), tokens.clone());
        let gate = AccessGate::new(resolver, store);
        Self {
            config,
            tokens,
            gate,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    #[must_use]
    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://app.blessedbelly.com".to_string());
        assert_eq!(config.frontend_base_url(), "https://app.blessedbelly.com");
        assert_eq!(config.admin_emails(), [DEFAULT_ADMIN_EMAIL.to_string()]);
        assert_eq!(config.token_ttl_seconds(), 604_800);
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert_eq!(config.oauth_session_url(), DEFAULT_OAUTH_SESSION_URL);

        let config = config
            .with_admin_emails([" Boss@Example.com ", "", "ops@example.com"])
            .with_token_ttl_seconds(60)
            .with_session_ttl_seconds(120)
            .with_oauth_session_url("http://localhost:9000/session".to_string());

        assert_eq!(
            config.admin_emails(),
            ["boss@example.com".to_string(), "ops@example.com".to_string()]
        );
        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.oauth_session_url(), "http://localhost:9000/session");
    }

    #[test]
    fn admin_email_match_is_exact() {
        let config = AuthConfig::default();
        assert!(config.is_admin_email("admin@blessedbelly.com"));
        assert!(!config.is_admin_email("admin@blessedbelly.co"));
        assert!(!config.is_admin_email("user@blessedbelly.com"));
    }

    #[test]
    fn auth_state_uses_configured_token_ttl() {
        let config = AuthConfig::default().with_token_ttl_seconds(42);
        let state = AuthState::new(
            config,
            SecretString::from("secret"),
            Arc::new(MemoryStore::new()),
        );
        assert_eq!(state.tokens().ttl_seconds(), 42);
    }
}
