//! Auth handlers and supporting modules.
//!
//! This module coordinates account creation, the OAuth session exchange, and
//! request authentication.
//!
//! ## Credential carriers
//!
//! A caller is identified by the `session_token` cookie (server-side session
//! row) or by an `Authorization: Bearer` token (stateless HS256 claim). The
//! cookie is always consulted first.
//!
//! ## Gates
//!
//! [`AccessGate`] layers subscription and admin checks on top of
//! authentication. Each check is a pure predicate over store lookups and may be
//! called any number of times per request.

pub(crate) mod gate;
pub(crate) mod me;
pub(crate) mod oauth;
mod password;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use gate::AccessGate;
pub use session::{SESSION_COOKIE_NAME, SessionResolver};
pub use state::{
    AuthConfig, AuthState, DEFAULT_ADMIN_EMAIL, DEFAULT_FRONTEND_BASE_URL,
    DEFAULT_OAUTH_SESSION_URL, DEFAULT_SESSION_TTL_SECONDS,
};
pub use token::{DEFAULT_TOKEN_TTL_SECONDS, TokenCodec, TokenError};
