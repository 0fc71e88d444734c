use crate::providers::{
    DEFAULT_PROVIDER_TIMEOUT_SECONDS, payments::DEFAULT_STRIPE_API_URL,
    text::{DEFAULT_LLM_API_URL, DEFAULT_LLM_MODEL},
};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_PROVIDER_TIMEOUT_SECONDS: &str = "provider-timeout-seconds";
pub const ARG_STRIPE_API_KEY: &str = "stripe-api-key";
pub const ARG_STRIPE_WEBHOOK_SECRET: &str = "stripe-webhook-secret";
pub const ARG_STRIPE_API_URL: &str = "stripe-api-url";
pub const ARG_LLM_API_KEY: &str = "llm-api-key";
pub const ARG_LLM_API_URL: &str = "llm-api-url";
pub const ARG_LLM_MODEL: &str = "llm-model";

#[derive(Debug)]
pub struct Options {
    pub timeout_seconds: u64,
    pub stripe_api_key: Option<SecretString>,
    pub stripe_webhook_secret: Option<SecretString>,
    pub stripe_api_url: String,
    pub llm_api_key: Option<SecretString>,
    pub llm_api_url: String,
    pub llm_model: String,
}

impl Options {
    /// Parse provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the timeout is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Env vars set to "" arrive as empty strings.
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };
        let get_secret = |id: &str| get_non_empty(id).map(SecretString::from);

        let timeout_seconds = matches
            .get_one::<u64>(ARG_PROVIDER_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            anyhow::bail!("--{ARG_PROVIDER_TIMEOUT_SECONDS} must be positive");
        }

        Ok(Self {
            timeout_seconds,
            stripe_api_key: get_secret(ARG_STRIPE_API_KEY),
            stripe_webhook_secret: get_secret(ARG_STRIPE_WEBHOOK_SECRET),
            stripe_api_url: get_non_empty(ARG_STRIPE_API_URL)
                .unwrap_or_else(|| DEFAULT_STRIPE_API_URL.to_string()),
            llm_api_key: get_secret(ARG_LLM_API_KEY),
            llm_api_url: get_non_empty(ARG_LLM_API_URL)
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_model: get_non_empty(ARG_LLM_MODEL)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = command.arg(
        Arg::new(ARG_PROVIDER_TIMEOUT_SECONDS)
            .long(ARG_PROVIDER_TIMEOUT_SECONDS)
            .help("Timeout for outbound identity, payment and text-generation calls")
            .env("BLESSEDBELLY_PROVIDER_TIMEOUT_SECONDS")
            .default_value("10")
            .value_parser(clap::value_parser!(u64)),
    );
    let command = with_payment_args(command);
    with_text_args(command)
}

fn with_payment_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_STRIPE_API_KEY)
                .long(ARG_STRIPE_API_KEY)
                .help("Stripe secret API key; checkout is unavailable without it")
                .env("BLESSEDBELLY_STRIPE_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_STRIPE_WEBHOOK_SECRET)
                .long(ARG_STRIPE_WEBHOOK_SECRET)
                .help("Stripe webhook signing secret")
                .env("BLESSEDBELLY_STRIPE_WEBHOOK_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_STRIPE_API_URL)
                .long(ARG_STRIPE_API_URL)
                .help("Stripe API base URL")
                .env("BLESSEDBELLY_STRIPE_API_URL")
                .default_value(DEFAULT_STRIPE_API_URL),
        )
}

fn with_text_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LLM_API_KEY)
                .long(ARG_LLM_API_KEY)
                .help("API key for AI recommendations; stored content is used without it")
                .env("BLESSEDBELLY_LLM_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_LLM_API_URL)
                .long(ARG_LLM_API_URL)
                .help("OpenAI-compatible API base URL")
                .env("BLESSEDBELLY_LLM_API_URL")
                .default_value(DEFAULT_LLM_API_URL),
        )
        .arg(
            Arg::new(ARG_LLM_MODEL)
                .long(ARG_LLM_MODEL)
                .help("Chat model used for recommendations")
                .env("BLESSEDBELLY_LLM_MODEL")
                .default_value(DEFAULT_LLM_MODEL),
        )
}
