//! Password recovery.

use axum::{extract::Extension, http::HeaderMap, Json};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    session::require_user,
    state::AuthState,
    types::{EmailRequest, MessageResponse, ResetPasswordRequest, SessionUserResponse},
};
use crate::{
    api::{
        deferred::DeferredEvent,
        error::{ApiError, ErrorBody},
        handlers::{checked_email, require_body, valid_password},
    },
    navigation::{AuthEvent, RESET_PASSWORD_PATH},
};

pub const RECOVERY_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent.";

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Recovery email requested", body = MessageResponse),
        (status = 400, description = "Invalid email or rejected by the provider", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = require_body(payload)?;
    let email = checked_email(&request.email, "Email is required")?;

    auth_state
        .provider()
        .recover_password(
            &email,
            &auth_state.config().redirect_url(RESET_PASSWORD_PATH),
        )
        .await
        .map_err(ApiError::from_provider)?;

    Ok(Json(MessageResponse::new(RECOVERY_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = SessionUserResponse),
        (status = 400, description = "Invalid password or rejected by the provider", body = ErrorBody),
        (status = 401, description = "No valid session", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Result<(DeferredEvent, Json<SessionUserResponse>), ApiError> {
    let authenticated = require_user(&auth_state, &headers).await?;
    let request = require_body(payload)?;
    if request.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let user = auth_state
        .provider()
        .update_password(&authenticated.access_token, &request.password)
        .await
        .map_err(ApiError::from_session_provider)?;
    info!("Password updated for user {}", user.id);

    let updated = AuthEvent::user_updated(user.view(), super::cookies::device_id(&headers));

    Ok((
        DeferredEvent(updated),
        Json(SessionUserResponse {
            success: true,
            user,
        }),
    ))
}
