//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    provider::{User, VerifyKind},
    storage::{ExperienceLevel, Profile},
};

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
    /// Whether the account still needs its email confirmed.
    pub confirmation_pending: bool,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub token_hash: String,
    #[serde(rename = "type")]
    pub kind: VerifyKind,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ConfirmResponse {
    pub success: bool,
    pub user: User,
    /// Page the confirmation view continues to.
    pub redirect_to: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct OnboardingRequest {
    pub experience_level: Option<ExperienceLevel>,
    pub learning_goals: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SessionUserResponse {
    pub success: bool,
    pub user: User,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ProfileResponse {
    pub user: Profile,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub user: Profile,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    #[must_use]
    pub const fn ok() -> Self {
        Self { success: true }
    }
}
