//! Session boundary guard for page requests.
//!
//! Runs before every page handler. Paths the route table does not classify
//! pass straight through; for the rest the session is resolved against the
//! provider (bounded by the guard timeout) and the [`Navigator`] decides.
//! Any failure to resolve counts as signed out.
//!
//! [`Navigator`]: crate::navigation::Navigator

use axum::{
    extract::{Extension, Request},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::handlers::auth::{cookies, AuthState};
use crate::navigation::{normalize_path, GateDecision, SessionView};

#[derive(Debug, Default)]
struct ResolvedSession {
    view: Option<SessionView>,
    /// Cookies of a session refreshed during resolution.
    cookies: HeaderMap,
}

pub async fn session_guard(
    Extension(auth_state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = normalize_path(request.uri().path());
    let Some(class) = auth_state.navigator().classify(&path) else {
        return next.run(request).await;
    };

    let resolved = match timeout(
        auth_state.config().guard_timeout(),
        resolve_session(&auth_state, request.headers()),
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(_) => {
            warn!("Session lookup timed out for {path}");
            ResolvedSession::default()
        }
    };

    let decision = auth_state
        .navigator()
        .decide_request(resolved.view.as_ref(), &path);
    debug!("{} {path}: {decision:?}", class.as_str());

    let mut response = match decision {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(target) => found(target),
    };
    for cookie in resolved.cookies.get_all(SET_COOKIE) {
        response.headers_mut().append(SET_COOKIE, cookie.clone());
    }
    response
}

/// `302 Found` to `target`.
fn found(target: &'static str) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, HeaderValue::from_static(target))],
    )
        .into_response()
}

async fn resolve_session(auth_state: &AuthState, headers: &HeaderMap) -> ResolvedSession {
    let provider = auth_state.provider();

    if let Some(access_token) = cookies::access_token(headers) {
        match provider.get_user(&access_token).await {
            Ok(user) => {
                return ResolvedSession {
                    view: Some(user.view()),
                    cookies: HeaderMap::new(),
                }
            }
            Err(err) if err.is_unauthorized() => debug!("Access token rejected: {err}"),
            Err(err) => {
                warn!("Failed to resolve session: {err}");
                return ResolvedSession::default();
            }
        }
    }

    let Some(refresh_token) = cookies::refresh_token(headers) else {
        return ResolvedSession::default();
    };
    match provider.refresh_session(&refresh_token).await {
        Ok(session) => {
            debug!("Refreshed session for user {}", session.user.id);
            ResolvedSession {
                view: Some(session.user.view()),
                cookies: cookies::session_cookies(auth_state.config(), &session),
            }
        }
        Err(err) => {
            debug!("Failed to refresh session: {err}");
            ResolvedSession::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::handlers::auth::AuthConfig, navigation::AuthEventBus, provider::MemoryProvider,
    };
    use axum::{body::Body, http::header::COOKIE, middleware, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(provider: Arc<MemoryProvider>) -> Router {
        let config = AuthConfig::new("http://localhost:8080".to_string())
            .with_guard_timeout(Duration::from_millis(50));
        let auth_state = Arc::new(AuthState::new(config, provider, AuthEventBus::new()));
        Router::new()
            .route("/dashboard", get(|| async { "dashboard" }))
            .route("/auth/login", get(|| async { "login" }))
            .route("/about", get(|| async { "about" }))
            .layer(middleware::from_fn(session_guard))
            .layer(Extension(auth_state))
    }

    async fn get_with_cookie(app: Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = axum::http::Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn unclassified_paths_pass_without_provider_calls() {
        let provider = Arc::new(MemoryProvider::new());
        provider.set_unavailable(true);
        let response = get_with_cookie(app(provider), "/about", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_without_session_redirects_to_login() {
        let response = get_with_cookie(app(Arc::new(MemoryProvider::new())), "/dashboard", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), Some("/auth/login"));
    }

    #[tokio::test]
    async fn non_canonical_protected_paths_are_guarded() {
        for uri in [
            "//dashboard/",
            "/./dashboard/",
            "/%64ashboard/",
            "/about/../dashboard",
            "/./dashboard/index.html",
        ] {
            let response = get_with_cookie(app(Arc::new(MemoryProvider::new())), uri, None).await;
            assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
            assert_eq!(location(&response), Some("/auth/login"), "{uri}");
        }
    }

    #[tokio::test]
    async fn signed_in_users_skip_login() {
        let provider = Arc::new(MemoryProvider::new());
        let session = provider.confirmed_session("a@x.com", "longenough1");
        let cookie = format!("sb-access-token={}", session.access_token);
        let response = get_with_cookie(app(provider), "/auth/login", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), Some("/dashboard"));
    }

    #[tokio::test]
    async fn slow_provider_fails_closed() {
        let provider = Arc::new(MemoryProvider::new());
        let session = provider.confirmed_session("a@x.com", "longenough1");
        provider.set_delay(Some(Duration::from_millis(500)));
        let cookie = format!("sb-access-token={}", session.access_token);
        let response = get_with_cookie(app(provider), "/dashboard", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), Some("/auth/login"));
    }

    #[tokio::test]
    async fn stale_access_token_is_refreshed() {
        let provider = Arc::new(MemoryProvider::new());
        let session = provider.confirmed_session("a@x.com", "longenough1");
        let cookie = format!(
            "sb-access-token=stale; sb-refresh-token={}",
            session.refresh_token
        );
        let response = get_with_cookie(app(provider), "/dashboard", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookies = response.headers().get_all(SET_COOKIE).iter().count();
        assert_eq!(set_cookies, 2);
    }
}
