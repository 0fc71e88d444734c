use crate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState},
    },
    cli::telemetry,
    providers::{
        self, HttpIdentityExchange, OpenAiTextGenerator, Providers, StripeGateway, TextGenerator,
    },
    store,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub admin_emails: Vec<String>,
    pub frontend_base_url: String,
    pub oauth_session_url: String,
    pub provider_timeout_seconds: u64,
    pub stripe_api_key: Option<SecretString>,
    pub stripe_webhook_secret: Option<SecretString>,
    pub stripe_api_url: String,
    pub llm_api_key: Option<SecretString>,
    pub llm_api_url: String,
    pub llm_model: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened, a provider client cannot be built, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = store::connect(&args.dsn)
        .await
        .context("Failed to open the document store")?;

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_oauth_session_url(args.oauth_session_url)
        .with_admin_emails(args.admin_emails)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds);
    let auth_state = Arc::new(AuthState::new(auth_config, args.jwt_secret, store.clone()));

    let client = providers::http_client(Duration::from_secs(args.provider_timeout_seconds))?;
    let text = args.llm_api_key.map(|key| {
        Arc::new(
            OpenAiTextGenerator::new(client.clone(), key)
                .with_api_url(args.llm_api_url)
                .with_model(args.llm_model),
        ) as Arc<dyn TextGenerator>
    });
    let providers = Providers {
        identity: Arc::new(HttpIdentityExchange::new(
            client.clone(),
            auth_state.config().oauth_session_url().to_string(),
        )),
        payments: Arc::new(
            StripeGateway::new(client, args.stripe_api_key)
                .with_api_url(args.stripe_api_url)
                .with_webhook_secret(args.stripe_webhook_secret),
        ),
        text,
    };

    let result = api::new(args.port, store, auth_state, providers).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("oauth_session_url", args.oauth_session_url.clone()),
        ("admin_emails", args.admin_emails.join(",")),
        ("token_ttl_seconds", args.token_ttl_seconds.to_string()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("stripe_api_url", args.stripe_api_url.clone()),
        ("stripe_api_key_set", args.stripe_api_key.is_some().to_string()),
        (
            "stripe_webhook_secret_set",
            args.stripe_webhook_secret.is_some().to_string(),
        ),
        ("llm_api_key_set", args.llm_api_key.is_some().to_string()),
        ("llm_model", args.llm_model.clone()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "blessedbelly {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    trimmed.chars().take(7).collect()
}
