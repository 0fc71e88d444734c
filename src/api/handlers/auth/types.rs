use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{Role, Subscription, User};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct OAuthSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub has_subscription: bool,
    pub subscription_status: Option<String>,
}

impl UserResponse {
    /// `has_subscription` follows the same literal `active` rule as the gate.
    #[must_use]
    pub fn new(user: &User, subscription: Option<&Subscription>) -> Self {
        let active = subscription.filter(|subscription| subscription.is_active());
        Self {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
            role: user.role,
            has_subscription: active.is_some(),
            subscription_status: active.map(|subscription| subscription.status.clone()),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct OAuthSessionResponse {
    pub user: UserResponse,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
