//! Resolving and establishing provider sessions.

use axum::{
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponseParts, ResponseParts},
};
use std::{convert::Infallible, fmt};
use tracing::{debug, error, info};

use super::{cookies, state::AuthState};
use crate::{
    api::{deferred::DeferredEvent, error::ApiError},
    navigation::{AuthEvent, AuthEventKind},
    provider::{Session, User},
    storage::{NewProfile, Store},
};

/// A request made with a session the provider still accepts.
pub struct Authenticated {
    pub user: User,
    pub access_token: String,
}

impl fmt::Debug for Authenticated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticated")
            .field("user", &self.user)
            .field("access_token", &"***")
            .finish()
    }
}

/// Resolve the caller's session, 401 when missing or rejected.
///
/// # Errors
/// Returns `Unauthorized` without a usable access token.
pub async fn require_user(auth_state: &AuthState, headers: &HeaderMap) -> Result<Authenticated, ApiError> {
    let Some(access_token) = cookies::access_token(headers) else {
        return Err(ApiError::not_authenticated());
    };

    let user = auth_state
        .provider()
        .get_user(&access_token)
        .await
        .map_err(ApiError::from_session_provider)?;

    Ok(Authenticated { user, access_token })
}

/// Cookies of a new session plus the event announcing it.
///
/// Used as a response part; the event goes out once the response is written.
#[derive(Debug)]
pub struct EstablishedSession {
    pub cookies: HeaderMap,
    pub event: DeferredEvent,
}

impl IntoResponseParts for EstablishedSession {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let res = self.cookies.into_response_parts(res)?;
        self.event.into_response_parts(res)
    }
}

/// The one place a session becomes active in the application.
///
/// Ensures the profile row once the email is confirmed and returns the
/// cookies to set with the `kind` event to publish after the response.
pub async fn establish_session(
    auth_state: &AuthState,
    store: &dyn Store,
    session: &Session,
    kind: AuthEventKind,
    headers: &HeaderMap,
) -> EstablishedSession {
    let user = &session.user;

    if user.is_confirmed() {
        let profile = NewProfile {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
        };
        match store.ensure_profile(profile).await {
            Ok(true) => info!("Created profile for user {}", user.id),
            Ok(false) => debug!("Profile already exists for user {}", user.id),
            // The session is still valid; profile reads fall back until the next sign-in.
            Err(err) => error!("Failed to ensure profile for user {}: {err:#}", user.id),
        }
    } else {
        debug!("Email not confirmed for user {}, profile deferred", user.id);
    }

    let device_id = cookies::device_id(headers);
    let event = match kind {
        AuthEventKind::SignedIn => AuthEvent::signed_in(user.view(), device_id),
        AuthEventKind::UserUpdated => AuthEvent::user_updated(user.view(), device_id),
        AuthEventKind::TokenRefreshed => AuthEvent::token_refreshed(user.view(), device_id),
        AuthEventKind::SignedOut => AuthEvent::signed_out(Some(user.id), device_id),
    };

    EstablishedSession {
        cookies: cookies::session_cookies(auth_state.config(), session),
        event: DeferredEvent(event),
    }
}

/// Number of `Set-Cookie` headers, for log lines.
pub(super) fn cookie_count(headers: &HeaderMap) -> usize {
    headers.get_all(SET_COOKIE).iter().count()
}
