//! Password signup.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    session::{cookie_count, establish_session},
    state::AuthState,
    types::{SignupRequest, SignupResponse},
};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        handlers::{checked_email, require_body, valid_password},
    },
    navigation::{AuthEventKind, CONFIRM_PATH},
    provider::SignUpOutcome,
    storage::Store,
};

pub const PENDING_MESSAGE: &str =
    "Please check your email to verify your account before signing in.";

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid input or rejected by the provider", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<SignupRequest>>,
) -> Result<Response, ApiError> {
    let request = require_body(payload)?;
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }
    let email = checked_email(&request.email, "Email and password are required")?;
    if !valid_password(&request.password) {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    let full_name = request
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let outcome = auth_state
        .provider()
        .sign_up(
            &email,
            &request.password,
            full_name,
            &auth_state.config().redirect_url(CONFIRM_PATH),
        )
        .await
        .map_err(ApiError::from_provider)?;

    match outcome {
        SignUpOutcome::Pending(user) => {
            debug!("Signup pending confirmation for user {}", user.id);
            Ok(Json(SignupResponse {
                success: true,
                message: PENDING_MESSAGE.to_string(),
                user,
                confirmation_pending: true,
            })
            .into_response())
        }
        SignUpOutcome::Active(session) => {
            let established = establish_session(
                &auth_state,
                store.0.as_ref(),
                &session,
                AuthEventKind::SignedIn,
                &headers,
            )
            .await;
            debug!("Signup active, setting {} cookies", cookie_count(&established.cookies));
            Ok((
                established,
                Json(SignupResponse {
                    success: true,
                    message: "Account created successfully.".to_string(),
                    user: session.user,
                    confirmation_pending: false,
                }),
            )
                .into_response())
        }
    }
}
