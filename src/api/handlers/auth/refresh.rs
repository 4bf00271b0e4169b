use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    cookies,
    session::establish_session,
    state::AuthState,
    types::SessionUserResponse,
};
use crate::{
    api::error::{ApiError, ErrorBody},
    navigation::AuthEventKind,
    provider::ProviderError,
    storage::Store,
};

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New session cookies set", body = SessionUserResponse),
        (status = 401, description = "Missing or rejected refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(refresh_token) = cookies::refresh_token(&headers) else {
        return Err(ApiError::not_authenticated());
    };

    let session = auth_state
        .provider()
        .refresh_session(&refresh_token)
        .await
        .map_err(|err| match err {
            // A refresh token the provider refuses is a dead session, not bad input.
            ProviderError::Rejected { .. } => ApiError::not_authenticated(),
            other => ApiError::from_provider(other),
        })?;
    debug!("Refreshed session for user {}", session.user.id);

    let established = establish_session(
        &auth_state,
        store.0.as_ref(),
        &session,
        AuthEventKind::TokenRefreshed,
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
