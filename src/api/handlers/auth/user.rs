//! Current user, profile edits and onboarding.

use axum::{extract::Extension, http::HeaderMap, Json};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    session::require_user,
    state::AuthState,
    types::{OnboardingRequest, ProfileResponse, ProfileUpdateResponse},
};
use crate::{
    api::{
        error::{ApiError, ErrorBody},
        handlers::require_body,
    },
    storage::{Profile, ProfileUpdate, Store},
};

const PROFILE_NOT_FOUND: &str = "Profile not found";

#[utoipa::path(
    get,
    path = "/api/auth/user",
    responses(
        (status = 200, description = "Profile of the signed-in user", body = ProfileResponse),
        (status = 401, description = "No valid session", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn current_user(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;

    let profile = match store.profile(user.id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => Profile::fallback(user.id, user.email, user.created_at, user.updated_at),
        Err(err) => {
            error!("Failed to load profile for user {}: {err:#}", user.id);
            Profile::fallback(user.id, user.email, user.created_at, user.updated_at)
        }
    };

    Ok(Json(ProfileResponse { user: profile }))
}

#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated", body = ProfileUpdateResponse),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 404, description = "Profile not created yet", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn update_profile(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<ProfileUpdate>>,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;
    let update = require_body(payload)?;

    let profile = store
        .update_profile(user.id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found(PROFILE_NOT_FOUND))?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        user: profile,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/onboarding",
    request_body = OnboardingRequest,
    responses(
        (status = 200, description = "Onboarding saved", body = ProfileUpdateResponse),
        (status = 400, description = "Experience level missing", body = ErrorBody),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 404, description = "Profile not created yet", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn onboarding(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<OnboardingRequest>>,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;
    let request = require_body(payload)?;
    let Some(experience_level) = request.experience_level else {
        return Err(ApiError::bad_request("Experience level is required"));
    };

    // Goals are replaced as a whole; leaving them out clears them.
    let update = ProfileUpdate {
        experience_level: Some(experience_level),
        learning_goals: Some(request.learning_goals.unwrap_or_default()),
        ..ProfileUpdate::default()
    };
    let profile = store
        .update_profile(user.id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found(PROFILE_NOT_FOUND))?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        user: profile,
    }))
}
