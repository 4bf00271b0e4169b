//! Auth state and configuration shared by the handlers and the session guard.

use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{
    grading::{Grader, LiteralGrader},
    navigation::{AuthEvent, AuthEventBus, Navigator},
    provider::AuthProvider,
};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_GUARD_TIMEOUT_MS: u64 = 3000;
const DEFAULT_DEVICE_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    device_ttl_seconds: i64,
    guard_timeout: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url: frontend_base_url.trim_end_matches('/').to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            device_ttl_seconds: DEFAULT_DEVICE_TTL_SECONDS,
            guard_timeout: Duration::from_millis(DEFAULT_GUARD_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = timeout;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn device_ttl_seconds(&self) -> i64 {
        self.device_ttl_seconds
    }

    #[must_use]
    pub fn guard_timeout(&self) -> Duration {
        self.guard_timeout
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }

    /// Absolute frontend URL for links the provider puts in emails.
    #[must_use]
    pub fn redirect_url(&self, path: &str) -> String {
        format!("{}{path}", self.frontend_base_url)
    }
}

pub struct AuthState {
    config: AuthConfig,
    provider: Arc<dyn AuthProvider>,
    navigator: Navigator,
    bus: AuthEventBus,
    grader: Arc<dyn Grader>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, provider: Arc<dyn AuthProvider>, bus: AuthEventBus) -> Self {
        Self {
            config,
            provider,
            navigator: Navigator::default(),
            bus,
            grader: Arc::new(LiteralGrader),
        }
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_grader(mut self, grader: Arc<dyn Grader>) -> Self {
        self.grader = grader;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn provider(&self) -> &dyn AuthProvider {
        self.provider.as_ref()
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[must_use]
    pub fn bus(&self) -> &AuthEventBus {
        &self.bus
    }

    #[must_use]
    pub fn grader(&self) -> &dyn Grader {
        self.grader.as_ref()
    }

    pub fn publish(&self, event: AuthEvent) {
        let delivered = self.bus.publish(event);
        debug!("auth event delivered to {delivered} subscribers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = AuthConfig::new("https://codelearn.dev/".to_string())
            .with_session_ttl_seconds(60)
            .with_guard_timeout(Duration::from_millis(250));

        assert_eq!(config.frontend_base_url(), "https://codelearn.dev");
        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.guard_timeout(), Duration::from_millis(250));
        assert!(config.session_cookie_secure());
        assert_eq!(
            config.redirect_url("/auth/confirm"),
            "https://codelearn.dev/auth/confirm"
        );
    }

    #[test]
    fn plain_http_frontend_gets_insecure_cookies() {
        let config = AuthConfig::new("http://localhost:8080".to_string());
        assert!(!config.session_cookie_secure());
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
    }
}
