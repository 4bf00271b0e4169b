//! Navigation policy shared by the session guard and the auth event stream.
//!
//! Flow Overview:
//! 1) [`RouteTable`] classifies a path as protected, auth-only or onboarding.
//! 2) [`Navigator::decide_request`] turns (session, path) into allow/redirect.
//! 3) [`Navigator::on_event`] turns an [`AuthEvent`] into a client directive,
//!    deferring to the request decision whenever the guard would redirect anyway.

mod decision;
mod events;
mod routes;

pub use decision::{ClientDirective, GateDecision, Navigator};
pub use events::{AuthEvent, AuthEventBus, AuthEventKind, Subscription};
pub use routes::{
    normalize_path, path_within, RouteClass, RouteTable, RouteTableError, AUTH_ONLY_PREFIXES,
    ONBOARDING_PREFIXES, PROTECTED_PREFIXES,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/auth/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const VERIFY_EMAIL_PATH: &str = "/verify-email";
pub const WELCOME_PATH: &str = "/welcome";
pub const ONBOARDING_PATH: &str = "/auth/onboarding";
pub const EXPLORE_PATH: &str = "/explore";
pub const AUTH_PREFIX: &str = "/auth";
pub const CONFIRM_PATH: &str = "/auth/confirm";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Pages that finish an email verification and own their redirect.
pub const CONFIRMATION_PREFIXES: &[&str] = &[CONFIRM_PATH, "/auth/callback"];

/// The parts of a provider session the navigation policy looks at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub email_confirmed: bool,
}

impl SessionView {
    #[must_use]
    pub fn new(user_id: Uuid, email: Option<String>, email_confirmed: bool) -> Self {
        Self {
            user_id,
            email,
            email_confirmed,
        }
    }
}
