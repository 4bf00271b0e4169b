//! Password login and logout.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    cookies,
    session::establish_session,
    state::AuthState,
    types::{LoginRequest, SessionUserResponse, SuccessResponse},
};
use crate::{
    api::{
        deferred::DeferredEvent,
        error::{ApiError, ErrorBody},
        handlers::{checked_email, require_body},
    },
    navigation::{AuthEvent, AuthEventKind},
    storage::Store,
};

const CREDENTIALS_REQUIRED: &str = "Email and password are required";

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, session cookies set", body = SessionUserResponse),
        (status = 400, description = "Invalid input or credentials", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, ApiError> {
    let request = require_body(payload)?;
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request(CREDENTIALS_REQUIRED));
    }
    let email = checked_email(&request.email, CREDENTIALS_REQUIRED)?;

    let session = auth_state
        .provider()
        .sign_in_with_password(&email, &request.password)
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

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cleared", body = SuccessResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>, headers: HeaderMap) -> Response {
    let mut user_id = None;
    if let Some(token) = cookies::access_token(&headers) {
        if let Ok(user) = auth_state.provider().get_user(&token).await {
            user_id = Some(user.id);
        }
        if let Err(err) = auth_state.provider().sign_out(&token).await {
            error!("Failed to sign out with the provider: {err}");
        }
    }

    let signed_out = AuthEvent::signed_out(user_id, cookies::device_id(&headers));

    // Always clear the cookies, even if the provider call failed.
    (
        cookies::clear_session_cookies(auth_state.config()),
        DeferredEvent(signed_out),
        Json(SuccessResponse::ok()),
    )
        .into_response()
}
