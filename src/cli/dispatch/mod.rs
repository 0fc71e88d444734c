//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments into the server action with its full
//! configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, providers};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let provider_opts = providers::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        admin_emails: auth_opts.admin_emails,
        frontend_base_url: auth_opts.frontend_base_url,
        oauth_session_url: auth_opts.oauth_session_url,
        provider_timeout_seconds: provider_opts.timeout_seconds,
        stripe_api_key: provider_opts.stripe_api_key,
        stripe_webhook_secret: provider_opts.stripe_webhook_secret,
        stripe_api_url: provider_opts.stripe_api_url,
        llm_api_key: provider_opts.llm_api_key,
        llm_api_url: provider_opts.llm_api_url,
        llm_model: provider_opts.llm_model,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn jwt_secret_required() {
        temp_env::with_vars(
            [
                ("BLESSEDBELLY_JWT_SECRET", None::<&str>),
                ("BLESSEDBELLY_DSN", Some("memory://")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["blessedbelly"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --jwt-secret")
                    );
                }
            },
        );
    }

    #[test]
    fn blank_secrets_are_treated_as_unset() {
        temp_env::with_vars(
            [
                ("BLESSEDBELLY_DSN", Some("memory://")),
                ("BLESSEDBELLY_JWT_SECRET", Some("jwt")),
                ("BLESSEDBELLY_STRIPE_API_KEY", Some("  ")),
                ("BLESSEDBELLY_LLM_API_KEY", Some("")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["blessedbelly"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert!(args.stripe_api_key.is_none());
                assert!(args.llm_api_key.is_none());
            },
        );
    }

    #[test]
    fn server_args_from_env() {
        temp_env::with_vars(
            [
                ("BLESSEDBELLY_DSN", Some("memory://")),
                ("BLESSEDBELLY_PORT", Some("3001")),
                ("BLESSEDBELLY_JWT_SECRET", Some("jwt")),
                ("BLESSEDBELLY_TOKEN_TTL_SECONDS", Some("3600")),
                ("BLESSEDBELLY_ADMIN_EMAILS", Some("a@x.com,b@x.com")),
                ("BLESSEDBELLY_FRONTEND_BASE_URL", Some("http://localhost:3000")),
                ("BLESSEDBELLY_STRIPE_API_KEY", Some("sk_test_1")),
                ("BLESSEDBELLY_LLM_API_KEY", Some("llm-key")),
                ("BLESSEDBELLY_LLM_MODEL", Some("gpt-4o-mini")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["blessedbelly"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 3001);
                assert_eq!(args.dsn, "memory://");
                assert_eq!(args.jwt_secret.expose_secret(), "jwt");
                assert_eq!(args.token_ttl_seconds, 3600);
                assert_eq!(args.admin_emails, ["a@x.com", "b@x.com"]);
                assert_eq!(args.frontend_base_url, "http://localhost:3000");
                assert_eq!(
                    args.stripe_api_key.as_ref().map(|k| k.expose_secret().to_string()),
                    Some("sk_test_1".to_string())
                );
                assert_eq!(args.llm_model, "gpt-4o-mini");
            },
        );
    }

    #[test]
    fn non_positive_ttl_rejected() {
        temp_env::with_vars(
            [
                ("BLESSEDBELLY_DSN", Some("memory://")),
                ("BLESSEDBELLY_JWT_SECRET", Some("jwt")),
                ("BLESSEDBELLY_SESSION_TTL_SECONDS", Some("0")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["blessedbelly"]);
                let result = handler(&matches);
                assert!(result.is_err());
            },
        );
    }

    #[test]
    fn oversized_ttl_rejected() {
        for (var, value) in [
            ("BLESSEDBELLY_SESSION_TTL_SECONDS", "9223372036854775807"),
            ("BLESSEDBELLY_TOKEN_TTL_SECONDS", "315360001"),
        ] {
            temp_env::with_vars(
                [
                    ("BLESSEDBELLY_DSN", Some("memory://")),
                    ("BLESSEDBELLY_JWT_SECRET", Some("jwt")),
                    (var, Some(value)),
                ],
                || {
                    let matches =
                        crate::cli::commands::new().get_matches_from(vec!["blessedbelly"]);
                    let Err(err) = handler(&matches) else {
                        panic!("{var}={value} should be rejected");
                    };
                    assert!(err.to_string().contains("must not exceed"), "{err}");
                },
            );
        }
    }

    #[test]
    fn ttl_at_upper_bound_accepted() {
        temp_env::with_vars(
            [
                ("BLESSEDBELLY_DSN", Some("memory://")),
                ("BLESSEDBELLY_JWT_SECRET", Some("jwt")),
                ("BLESSEDBELLY_SESSION_TTL_SECONDS", Some("315360000")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["blessedbelly"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert_eq!(args.session_ttl_seconds, auth::MAX_TTL_SECONDS);
            },
        );
    }
}
