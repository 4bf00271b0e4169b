//! Emailed link confirmation and verification resends.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    session::establish_session,
    state::AuthState,
    types::{ConfirmRequest, ConfirmResponse, EmailRequest, MessageResponse},
};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        handlers::{checked_email, require_body},
    },
    navigation::{AuthEventKind, CONFIRM_PATH, RESET_PASSWORD_PATH, WELCOME_PATH},
    provider::VerifyKind,
    storage::Store,
};

/// Event published for a verified link.
///
/// Confirming an address updates an existing account, while magic and
/// recovery links sign the user in.
#[must_use]
pub const fn confirmation_event(kind: VerifyKind) -> AuthEventKind {
    match kind {
        VerifyKind::Signup | VerifyKind::Email => AuthEventKind::UserUpdated,
        VerifyKind::Magiclink | VerifyKind::Recovery => AuthEventKind::SignedIn,
    }
}

/// Page the confirmation view continues to.
#[must_use]
pub const fn confirmation_redirect(kind: VerifyKind) -> &'static str {
    match kind {
        VerifyKind::Recovery => RESET_PASSWORD_PATH,
        VerifyKind::Signup | VerifyKind::Email | VerifyKind::Magiclink => WELCOME_PATH,
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/confirm",
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Link verified, session cookies set", body = ConfirmResponse),
        (status = 400, description = "Invalid or expired link", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn confirm(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<ConfirmRequest>>,
) -> Result<Response, ApiError> {
    let request = require_body(payload)?;
    let token_hash = request.token_hash.trim();
    if token_hash.is_empty() {
        return Err(ApiError::bad_request("Token hash is required"));
    }

    let session = auth_state
        .provider()
        .verify_token_hash(token_hash, request.kind)
        .await
        .map_err(ApiError::from_provider)?;
    info!(
        "Verified {} link for user {}",
        request.kind.as_str(),
        session.user.id
    );

    let established = establish_session(
        &auth_state,
        store.0.as_ref(),
        &session,
        confirmation_event(request.kind),
        &headers,
    )
    .await;

    Ok((
        established,
        Json(ConfirmResponse {
            success: true,
            user: session.user,
            redirect_to: confirmation_redirect(request.kind).to_string(),
        }),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Verification email sent", body = MessageResponse),
        (status = 400, description = "Invalid email or rejected by the provider", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn resend_verification(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request = require_body(payload)?;
    let email = checked_email(&request.email, "Email is required")?;

    auth_state
        .provider()
        .resend_signup(&email, &auth_state.config().redirect_url(CONFIRM_PATH))
        .await
        .map_err(ApiError::from_provider)?;

    Ok(Json(MessageResponse::new(
        "Verification email sent. Please check your inbox.",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_confirmations_update_the_user() {
        assert_eq!(confirmation_event(VerifyKind::Signup), AuthEventKind::UserUpdated);
        assert_eq!(confirmation_event(VerifyKind::Email), AuthEventKind::UserUpdated);
        assert_eq!(confirmation_event(VerifyKind::Magiclink), AuthEventKind::SignedIn);
        assert_eq!(confirmation_event(VerifyKind::Recovery), AuthEventKind::SignedIn);
    }

    #[test]
    fn recovery_continues_to_password_reset() {
        assert_eq!(confirmation_redirect(VerifyKind::Recovery), "/auth/reset-password");
        assert_eq!(confirmation_redirect(VerifyKind::Signup), "/welcome");
        assert_eq!(confirmation_redirect(VerifyKind::Magiclink), "/welcome");
    }
}
