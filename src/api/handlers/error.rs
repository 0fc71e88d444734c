//! HTTP error taxonomy shared by every handler.
//!
//! Each variant maps to a fixed status and a `{"detail": ...}` body. Store and
//! provider failures are logged where they happen and surface only as
//! generic messages.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Active subscription required")]
    SubscriptionRequired,
    #[error("Admin access required")]
    AdminRequired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid session")]
    InvalidExternalSession,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::InvalidCredentials | Self::InvalidExternalSession => {
                StatusCode::UNAUTHORIZED
            }
            Self::SubscriptionRequired | Self::AdminRequired => StatusCode::FORBIDDEN,
            Self::DuplicateEmail | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }
}

/// Store failures: log the chain, answer 500.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("{err:#}");
        Self::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn statuses() {
        let cases = [
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ApiError::SubscriptionRequired, StatusCode::FORBIDDEN),
            (ApiError::AdminRequired, StatusCode::FORBIDDEN),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::DuplicateEmail, StatusCode::BAD_REQUEST),
            (ApiError::InvalidExternalSession, StatusCode::UNAUTHORIZED),
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[tokio::test]
    async fn body_is_detail_json() -> anyhow::Result<()> {
        let response = ApiError::SubscriptionRequired.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = response.into_body().collect().await?.to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(body.detail, "Active subscription required");
        Ok(())
    }

    #[tokio::test]
    async fn internal_hides_cause() -> anyhow::Result<()> {
        let err: ApiError = anyhow::anyhow!("connection refused on 10.0.0.7").into();
        let bytes = err.into_response().into_body().collect().await?.to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes)?;
        assert_eq!(body.detail, "Internal server error");
        Ok(())
    }
}
