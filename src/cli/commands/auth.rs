use crate::api::handlers::auth::{
    DEFAULT_ADMIN_EMAIL, DEFAULT_FRONTEND_BASE_URL, DEFAULT_OAUTH_SESSION_URL,
    DEFAULT_SESSION_TTL_SECONDS, DEFAULT_TOKEN_TTL_SECONDS,
};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_ADMIN_EMAILS: &str = "admin-emails";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_OAUTH_SESSION_URL: &str = "oauth-session-url";

/// Upper bound for token and session lifetimes (ten years).
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub admin_emails: Vec<String>,
    pub frontend_base_url: String,
    pub oauth_session_url: String,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or a TTL is out of range.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let jwt_secret = match matches.get_one::<String>(ARG_JWT_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}"),
        };

        let read_ttl = |id: &str, default: i64| -> anyhow::Result<i64> {
            let ttl = matches.get_one::<i64>(id).copied().unwrap_or(default);
            if ttl <= 0 {
                anyhow::bail!("--{id} must be positive");
            }
            if ttl > MAX_TTL_SECONDS {
                anyhow::bail!("--{id} must not exceed {MAX_TTL_SECONDS} seconds");
            }
            Ok(ttl)
        };

        let admin_emails = matches
            .get_one::<String>(ARG_ADMIN_EMAILS)
            .map(|value| value.split(',').map(str::to_string).collect())
            .unwrap_or_else(|| vec![DEFAULT_ADMIN_EMAIL.to_string()]);

        Ok(Self {
            jwt_secret,
            token_ttl_seconds: read_ttl(ARG_TOKEN_TTL_SECONDS, DEFAULT_TOKEN_TTL_SECONDS)?,
            session_ttl_seconds: read_ttl(ARG_SESSION_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS)?,
            admin_emails,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_FRONTEND_BASE_URL.to_string()),
            oauth_session_url: matches
                .get_one::<String>(ARG_OAUTH_SESSION_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_OAUTH_SESSION_URL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign bearer tokens (HS256)")
                .env("BLESSEDBELLY_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Bearer token lifetime in seconds")
                .env("BLESSEDBELLY_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("BLESSEDBELLY_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ADMIN_EMAILS)
                .long(ARG_ADMIN_EMAILS)
                .help("Comma separated emails that receive the admin role at signup")
                .env("BLESSEDBELLY_ADMIN_EMAILS")
                .default_value(DEFAULT_ADMIN_EMAIL),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used as the only allowed CORS origin")
                .env("BLESSEDBELLY_FRONTEND_BASE_URL")
                .default_value(DEFAULT_FRONTEND_BASE_URL),
        )
        .arg(
            Arg::new(ARG_OAUTH_SESSION_URL)
                .long(ARG_OAUTH_SESSION_URL)
                .help("Identity provider endpoint that exchanges a session_id for a profile")
                .env("BLESSEDBELLY_OAUTH_SESSION_URL")
                .default_value(DEFAULT_OAUTH_SESSION_URL),
        )
}
