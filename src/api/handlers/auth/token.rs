//! Stateless HS256 identity tokens.
//!
//! Compact JWT layout (`header.claims.signature`, base64url without padding).
//! Verification checks the MAC before looking at the claims, so a tampered
//! token is always `Invalid` and never `Expired`.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

const ALG: &str = "HS256";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: String,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, wrong algorithm, or signature mismatch.
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Signs and verifies identity claims with a process-wide secret.
pub struct TokenCodec {
    secret: SecretString,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a token for `user_id` expiring `ttl_seconds` from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<String> {
        let header = TokenHeader {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            exp: now.timestamp().saturating_add(self.ttl_seconds),
        };
        let header_b64 = b64e_json(&header).context("failed to encode token header")?;
        let claims_b64 = b64e_json(&claims).context("failed to encode token claims")?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac().context("failed to initialise token MAC")?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a token and return the user id it names.
    ///
    /// # Errors
    /// [`TokenError::Invalid`] for malformed or forged tokens,
    /// [`TokenError::Expired`] once `exp` is reached.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock.
    ///
    /// # Errors
    /// See [`TokenCodec::verify`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Invalid)?;
        let claims_b64 = parts.next().ok_or(TokenError::Invalid)?;
        let sig_b64 = parts.next().ok_or(TokenError::Invalid)?;
        if parts.next().is_some() {
            return Err(TokenError::Invalid);
        }

        let header: TokenHeader = b64d_json(header_b64).ok_or(TokenError::Invalid)?;
        if header.alg != ALG {
            return Err(TokenError::Invalid);
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Invalid)?;
        let mut mac = self.mac().map_err(|_| TokenError::Invalid)?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let claims: TokenClaims = b64d_json(claims_b64).ok_or(TokenError::Invalid)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims.user_id)
    }

    fn mac(&self) -> Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Option<T> {
    let bytes = Base64UrlUnpadded::decode_vec(s).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn codec() -> TokenCodec {
        TokenCodec::new(SecretString::from("test-signing-secret"))
    }

    fn issued_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    #[test]
    fn verifies_until_expiry() -> Result<()> {
        let codec = codec();
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;

        assert_eq!(codec.verify_at(&token, now), Ok("user_abc".to_string()));
        let last_valid = now + Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS - 1);
        assert_eq!(codec.verify_at(&token, last_valid), Ok("user_abc".to_string()));

        let expiry = now + Duration::seconds(DEFAULT_TOKEN_TTL_SECONDS);
        assert_eq!(codec.verify_at(&token, expiry), Err(TokenError::Expired));
        let later = expiry + Duration::days(30);
        assert_eq!(codec.verify_at(&token, later), Err(TokenError::Expired));
        Ok(())
    }

    #[test]
    fn expiry_is_seven_days_by_default() -> Result<()> {
        let codec = codec();
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;
        let claims_b64 = token.split('.').nth(1).unwrap_or_default();
        let claims: Option<TokenClaims> = b64d_json(claims_b64);
        assert_eq!(
            claims.map(|c| c.exp),
            Some((now + Duration::days(7)).timestamp())
        );
        Ok(())
    }

    #[test]
    fn tampered_signature_is_invalid_not_expired() -> Result<()> {
        let codec = codec();
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;
        let (signing_input, sig_b64) = token.rsplit_once('.').unwrap_or_default();
        let mut signature = Base64UrlUnpadded::decode_vec(sig_b64)
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        for byte in 0..signature.len() {
            for bit in 0..8 {
                signature[byte] ^= 1 << bit;
                let forged = format!(
                    "{signing_input}.{}",
                    Base64UrlUnpadded::encode_string(&signature)
                );
                signature[byte] ^= 1 << bit;

                assert_eq!(codec.verify_at(&forged, now), Err(TokenError::Invalid));
                // Even long after expiry the forgery is reported as invalid.
                let later = now + Duration::days(365);
                assert_eq!(codec.verify_at(&forged, later), Err(TokenError::Invalid));
            }
        }
        Ok(())
    }

    #[test]
    fn swapped_claims_are_invalid() -> Result<()> {
        let codec = codec();
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;
        let other = codec.issue_at("user_xyz", now)?;

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert_eq!(codec.verify_at(&forged, now), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn other_secret_is_invalid() -> Result<()> {
        let now = issued_at();
        let token = codec().issue_at("user_abc", now)?;
        let other = TokenCodec::new(SecretString::from("another-secret"));
        assert_eq!(other.verify_at(&token, now), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let codec = codec();
        let now = issued_at();
        for token in ["", "abc", "a.b", "a.b.c", "a.b.c.d", "...", "Bearer x.y.z"] {
            assert_eq!(codec.verify_at(token, now), Err(TokenError::Invalid), "{token:?}");
        }
    }

    #[test]
    fn wrong_algorithm_is_invalid() -> Result<()> {
        let codec = codec();
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;
        let parts: Vec<&str> = token.split('.').collect();
        let header = b64e_json(&TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let forged = format!("{header}.{}.{}", parts[1], parts[2]);
        assert_eq!(codec.verify_at(&forged, now), Err(TokenError::Invalid));
        Ok(())
    }

    #[test]
    fn custom_ttl() -> Result<()> {
        let codec = codec().with_ttl_seconds(60);
        let now = issued_at();
        let token = codec.issue_at("user_abc", now)?;
        assert!(codec.verify_at(&token, now + Duration::seconds(59)).is_ok());
        assert_eq!(
            codec.verify_at(&token, now + Duration::seconds(60)),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-signing-secret"));
        assert!(rendered.contains("***"));
    }
}
