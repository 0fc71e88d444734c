//! API handlers and shared utilities.
//!
//! Account handlers live under [`auth`]; everything else is one module per
//! resource. Handlers receive the store, auth state and providers through
//! `Extension` layers installed in [`crate::api::new`].

pub mod admin;
pub mod auth;
pub mod checkin;
pub mod checkout;
pub mod error;
pub mod health;
pub mod root;
pub mod subscription;
pub mod triggers;

pub use error::{ApiError, ErrorBody};
