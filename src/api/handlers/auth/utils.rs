//! Small helpers shared by the account handlers.

use anyhow::Result;
use regex::Regex;

use super::types::UserResponse;
use crate::store::{DynStore, User};

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Load the user's subscription and render the public user view.
pub(crate) async fn user_response(store: &DynStore, user: &User) -> Result<UserResponse> {
    let subscription = store.find_subscription(&user.user_id).await?;
    Ok(UserResponse::new(user, subscription.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("user@example.com"));
    }

    #[test]
    fn valid_email_rejects_malformed() {
        for email in ["", "user.example.com", "user@", "@example.com", "a b@x.com", "user@host"] {
            assert!(!valid_email(email), "{email:?}");
        }
    }
}
