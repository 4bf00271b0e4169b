//! One-time code login.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    session::establish_session,
    state::AuthState,
    types::{EmailRequest, MessageResponse, SessionUserResponse, VerifyOtpRequest},
};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        handlers::{checked_email, require_body, valid_otp},
    },
    navigation::{AuthEventKind, CONFIRM_PATH},
    storage::Store,
};

pub const OTP_SENT_MESSAGE: &str =
    "OTP sent to your email. Check your inbox (including spam folder).";

#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Invalid email or rejected by the provider", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn send_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = require_body(payload)?;
    let email = checked_email(&request.email, "Email is required")?;

    auth_state
        .provider()
        .send_otp(&email, &auth_state.config().redirect_url(CONFIRM_PATH))
        .await
        .map_err(ApiError::from_provider)?;

    debug!("One-time code requested");
    Ok(Json(MessageResponse::new(OTP_SENT_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Signed in, session cookies set", body = SessionUserResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify_otp(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Response, ApiError> {
    let request = require_body(payload)?;
    let otp = request.otp.trim();
    if request.email.trim().is_empty() || otp.is_empty() {
        return Err(ApiError::bad_request("Email and OTP are required"));
    }
    let email = checked_email(&request.email, "Email and OTP are required")?;
    if !valid_otp(otp) {
        return Err(ApiError::bad_request("OTP must be a 6-digit code"));
    }

    let session = auth_state
        .provider()
        .verify_otp(&email, otp)
        .await
        .map_err(ApiError::from_provider)?;

    let established = establish_session(
        &auth_state,
        store.0.as_ref(),
        &session,
        AuthEventKind::SignedIn,
        &headers,
    )
    .await;

    Ok((
        established,
        Json(SessionUserResponse {
            success: true,
            user: session.user,
        }),
    )
        .into_response())
}
