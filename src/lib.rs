//! # Blessed Belly (gut-health coaching API)
//!
//! `blessedbelly` serves the backend for a subscription wellness app: account
//! sign-up and login, a daily check-in that turns a short signal ("stressed",
//! "cravings", ...) into an action, a movement and a verse, trigger cards for
//! common situations, and admin tools for curating that content.
//!
//! ## Authentication
//!
//! Callers are identified either by a server-side session (the
//! `session_token` cookie, created by the external OAuth exchange) or by a
//! stateless HS256 bearer token issued at register/login. The cookie wins when
//! both are present. Session expiry is checked lazily on each lookup.
//!
//! ## Access gates
//!
//! Content endpoints require an `active` subscription; curation endpoints
//! require the `admin` role. Roles are assigned once at account creation from
//! an email allow-list and never change afterwards.
//!
//! ## Payments
//!
//! Subscriptions are activated by the hosted checkout flow, either when the
//! client polls the checkout status or when the signed payment webhook
//! arrives. Only the current subscription state is kept.

pub mod api;
pub mod cli;
pub mod providers;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
