//! The single navigation authority.

use serde::Serialize;
use utoipa::ToSchema;

use super::{
    path_within, normalize_path, AuthEvent, AuthEventKind, RouteClass, RouteTable, SessionView,
    AUTH_PREFIX, CONFIRMATION_PREFIXES, DASHBOARD_PATH, EXPLORE_PATH, LOGIN_PATH, ROOT_PATH,
    VERIFY_EMAIL_PATH, WELCOME_PATH,
};

// Upper bound on guard redirects followed when settling a navigation target.
const MAX_REDIRECT_HOPS: usize = 4;

/// Outcome of the request-time guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

impl GateDecision {
    #[must_use]
    pub const fn target(self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Redirect(target) => Some(target),
        }
    }
}

/// What a client should do after an auth event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientDirective {
    Stay,
    /// Re-request the current route and let the guard decide.
    Refresh,
    Navigate { to: String },
}

#[derive(Clone, Debug, Default)]
pub struct Navigator {
    routes: RouteTable,
}

impl Navigator {
    #[must_use]
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        self.routes.classify(path)
    }

    /// Guard decision for a page request; first matching rule wins.
    ///
    /// `session` is `None` whenever the session could not be resolved, which
    /// includes provider failures and timeouts.
    #[must_use]
    pub fn decide_request(&self, session: Option<&SessionView>, path: &str) -> GateDecision {
        match (self.routes.classify(path), session) {
            (Some(RouteClass::Protected), None) => GateDecision::Redirect(LOGIN_PATH),
            (Some(RouteClass::Protected), Some(session)) if !session.email_confirmed => {
                GateDecision::Redirect(VERIFY_EMAIL_PATH)
            }
            (Some(RouteClass::AuthOnly), Some(_)) => GateDecision::Redirect(DASHBOARD_PATH),
            (Some(RouteClass::Onboarding), None) => GateDecision::Redirect(LOGIN_PATH),
            _ => GateDecision::Allow,
        }
    }

    /// Client reaction to an auth event observed while on `path`.
    ///
    /// Navigations the guard enforces on its own become [`ClientDirective::Refresh`],
    /// so a stale event can never fight the guard. Any remaining navigation
    /// target is one the guard allows for the event's session.
    #[must_use]
    pub fn on_event(&self, event: &AuthEvent, path: &str) -> ClientDirective {
        let path = normalize_path(path);
        let session = event.session.as_ref();
        let gate = self.decide_request(session, &path);

        let Some(intent) = self.event_intent(event, &path) else {
            if event.kind == AuthEventKind::TokenRefreshed || gate != GateDecision::Allow {
                return ClientDirective::Refresh;
            }
            return ClientDirective::Stay;
        };

        let target = self.settle(session, intent);
        if let GateDecision::Redirect(first) = gate {
            if self.settle(session, first) == target {
                return ClientDirective::Refresh;
            }
        }
        if path_within(&path, target) {
            return ClientDirective::Stay;
        }

        ClientDirective::Navigate {
            to: target.to_string(),
        }
    }

    /// Where the event asks to go, before reconciling with the guard.
    fn event_intent(&self, event: &AuthEvent, path: &str) -> Option<&'static str> {
        match (event.kind, event.session.as_ref()) {
            (AuthEventKind::SignedIn, Some(session)) => {
                if in_confirmation_subtree(path) {
                    None
                } else if !session.email_confirmed {
                    // An unconfirmed user waits on the verification page.
                    (path != VERIFY_EMAIL_PATH).then_some(VERIFY_EMAIL_PATH)
                } else if [DASHBOARD_PATH, WELCOME_PATH, EXPLORE_PATH]
                    .iter()
                    .any(|prefix| path_within(path, prefix))
                {
                    None
                } else {
                    Some(DASHBOARD_PATH)
                }
            }
            (AuthEventKind::SignedOut, _) => {
                (!path_within(path, AUTH_PREFIX) && path != ROOT_PATH).then_some(LOGIN_PATH)
            }
            (AuthEventKind::UserUpdated, Some(session)) if session.email_confirmed => {
                (path == VERIFY_EMAIL_PATH || in_confirmation_subtree(path)).then_some(WELCOME_PATH)
            }
            _ => None,
        }
    }

    /// Follow guard redirects from `target` until a page the guard allows.
    fn settle(&self, session: Option<&SessionView>, target: &'static str) -> &'static str {
        let mut current = target;
        for _ in 0..MAX_REDIRECT_HOPS {
            match self.decide_request(session, current) {
                GateDecision::Allow => return current,
                GateDecision::Redirect(next) if next == current => return current,
                GateDecision::Redirect(next) => current = next,
            }
        }
        current
    }
}

fn in_confirmation_subtree(path: &str) -> bool {
    CONFIRMATION_PREFIXES
        .iter()
        .any(|prefix| path_within(path, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn confirmed() -> SessionView {
        SessionView::new(Uuid::new_v4(), Some("a@x.com".to_string()), true)
    }

    fn unconfirmed() -> SessionView {
        SessionView::new(Uuid::new_v4(), Some("a@x.com".to_string()), false)
    }

    fn navigate(to: &str) -> ClientDirective {
        ClientDirective::Navigate { to: to.to_string() }
    }

    #[test]
    fn protected_without_session_redirects_to_login() {
        let navigator = Navigator::default();
        for path in ["/dashboard", "/dashboard/progress", "/explore/python"] {
            assert_eq!(
                navigator.decide_request(None, path),
                GateDecision::Redirect(LOGIN_PATH)
            );
        }
    }

    #[test]
    fn protected_with_unconfirmed_session_redirects_to_verification() {
        let navigator = Navigator::default();
        assert_eq!(
            navigator.decide_request(Some(&unconfirmed()), "/dashboard"),
            GateDecision::Redirect(VERIFY_EMAIL_PATH)
        );
        assert_eq!(
            navigator.decide_request(Some(&confirmed()), "/dashboard"),
            GateDecision::Allow
        );
    }

    #[test]
    fn auth_only_with_session_redirects_to_dashboard() {
        let navigator = Navigator::default();
        for path in ["/auth/login", "/auth/signup", "/auth/otp", "/auth/magic-link"] {
            assert_eq!(
                navigator.decide_request(Some(&unconfirmed()), path),
                GateDecision::Redirect(DASHBOARD_PATH)
            );
            assert_eq!(navigator.decide_request(None, path), GateDecision::Allow);
        }
    }

    #[test]
    fn onboarding_requires_any_session() {
        let navigator = Navigator::default();
        assert_eq!(
            navigator.decide_request(None, "/auth/onboarding"),
            GateDecision::Redirect(LOGIN_PATH)
        );
        assert_eq!(
            navigator.decide_request(Some(&unconfirmed()), "/auth/onboarding"),
            GateDecision::Allow
        );
    }

    #[test]
    fn unclassified_paths_are_allowed() {
        let navigator = Navigator::default();
        for path in ["/", "/welcome", "/verify-email", "/auth/confirm"] {
            assert_eq!(navigator.decide_request(None, path), GateDecision::Allow);
        }
    }

    #[test]
    fn signed_in_from_root_navigates_to_dashboard() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_in(confirmed(), None);
        assert_eq!(navigator.on_event(&event, "/"), navigate(DASHBOARD_PATH));
    }

    #[test]
    fn signed_in_on_auth_page_defers_to_guard() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_in(confirmed(), None);
        assert_eq!(
            navigator.on_event(&event, "/auth/login"),
            ClientDirective::Refresh
        );
    }

    #[test]
    fn signed_in_inside_confirmation_subtree_stays() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_in(unconfirmed(), None);
        assert_eq!(
            navigator.on_event(&event, "/auth/confirm"),
            ClientDirective::Stay
        );
        assert_eq!(
            navigator.on_event(&event, "/auth/callback"),
            ClientDirective::Stay
        );
    }

    #[test]
    fn signed_in_unconfirmed_goes_to_verification() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_in(unconfirmed(), None);
        assert_eq!(
            navigator.on_event(&event, "/welcome"),
            navigate(VERIFY_EMAIL_PATH)
        );
        // The guard already sends unconfirmed users off protected pages.
        assert_eq!(
            navigator.on_event(&event, "/dashboard"),
            ClientDirective::Refresh
        );
        assert_eq!(
            navigator.on_event(&event, "/verify-email"),
            ClientDirective::Stay
        );
    }

    #[test]
    fn signed_in_on_landing_pages_stays() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_in(confirmed(), None);
        for path in ["/dashboard", "/dashboard/profile", "/welcome", "/explore/java"] {
            assert_eq!(navigator.on_event(&event, path), ClientDirective::Stay);
        }
    }

    #[test]
    fn signed_out_outside_auth_navigates_to_login() {
        let navigator = Navigator::default();
        let event = AuthEvent::signed_out(None, None);
        assert_eq!(
            navigator.on_event(&event, "/welcome"),
            navigate(LOGIN_PATH)
        );
        assert_eq!(
            navigator.on_event(&event, "/dashboard"),
            ClientDirective::Refresh
        );
        assert_eq!(navigator.on_event(&event, "/"), ClientDirective::Stay);
        assert_eq!(
            navigator.on_event(&event, "/auth/signup"),
            ClientDirective::Stay
        );
        // Onboarding needs a session; the guard performs that redirect.
        assert_eq!(
            navigator.on_event(&event, "/auth/onboarding"),
            ClientDirective::Refresh
        );
    }

    #[test]
    fn user_updated_after_confirmation_goes_to_welcome() {
        let navigator = Navigator::default();
        let event = AuthEvent::user_updated(confirmed(), None);
        assert_eq!(
            navigator.on_event(&event, "/verify-email"),
            navigate(WELCOME_PATH)
        );
        assert_eq!(
            navigator.on_event(&event, "/auth/callback"),
            navigate(WELCOME_PATH)
        );
        assert_eq!(
            navigator.on_event(&event, "/dashboard"),
            ClientDirective::Stay
        );
    }

    #[test]
    fn user_updated_while_unconfirmed_stays() {
        let navigator = Navigator::default();
        let event = AuthEvent::user_updated(unconfirmed(), None);
        assert_eq!(
            navigator.on_event(&event, "/verify-email"),
            ClientDirective::Stay
        );
    }

    #[test]
    fn token_refreshed_only_refreshes() {
        let navigator = Navigator::default();
        let event = AuthEvent::token_refreshed(confirmed(), None);
        for path in ["/", "/dashboard", "/welcome"] {
            assert_eq!(navigator.on_event(&event, path), ClientDirective::Refresh);
        }
    }

    #[test]
    fn navigation_targets_are_always_allowed_by_the_guard() {
        let navigator = Navigator::default();
        let sessions = [Some(confirmed()), Some(unconfirmed()), None];
        let paths = [
            "/",
            "/welcome",
            "/verify-email",
            "/dashboard",
            "/explore/python",
            "/auth/login",
            "/auth/onboarding",
            "/auth/confirm",
        ];

        for session in &sessions {
            let events = match session {
                Some(session) => vec![
                    AuthEvent::signed_in(session.clone(), None),
                    AuthEvent::user_updated(session.clone(), None),
                    AuthEvent::token_refreshed(session.clone(), None),
                ],
                None => vec![AuthEvent::signed_out(None, None)],
            };
            for event in &events {
                for path in paths {
                    if let ClientDirective::Navigate { to } = navigator.on_event(event, path) {
                        assert_ne!(normalize_path(path), to, "{event:?} at {path}");
                        assert_eq!(
                            navigator.decide_request(session.as_ref(), &to),
                            GateDecision::Allow,
                            "{event:?} at {path} -> {to}"
                        );
                    }
                }
            }
        }
    }
}
