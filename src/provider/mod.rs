//! Hosted authentication provider.
//!
//! The application never stores credentials or issues tokens; every session
//! change is a call through [`AuthProvider`].

pub mod gotrue;
pub mod memory;

pub use gotrue::GoTrueProvider;
pub use memory::MemoryProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::navigation::SessionView;

/// Identity record as returned by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_confirmed_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_metadata: Value,
}

impl User {
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at
            .as_deref()
            .is_some_and(|at| !at.is_empty())
    }

    /// `full_name` from the signup metadata, when present.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView::new(self.id, self.email.clone(), self.is_confirmed())
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub token_type: String,
    pub user: User,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SignUpOutcome {
    /// Account created, email confirmation pending.
    Pending(User),
    /// The provider confirmed immediately and issued a session.
    Active(Session),
}

/// Kinds of emailed verification links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VerifyKind {
    Signup,
    Magiclink,
    Email,
    Recovery,
}

impl VerifyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Magiclink => "magiclink",
            Self::Email => "email",
            Self::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered and refused; `message` is passed to the caller verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
    #[error("invalid response from auth provider: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// The presented token is no longer accepted.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403, .. })
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        redirect_to: &str,
    ) -> ProviderResult<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session>;

    /// Email a one-time code (and magic link), creating the user when needed.
    async fn send_otp(&self, email: &str, redirect_to: &str) -> ProviderResult<()>;

    async fn verify_otp(&self, email: &str, token: &str) -> ProviderResult<Session>;

    async fn verify_token_hash(&self, token_hash: &str, kind: VerifyKind)
        -> ProviderResult<Session>;

    async fn get_user(&self, access_token: &str) -> ProviderResult<User>;

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session>;

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()>;

    async fn resend_signup(&self, email: &str, redirect_to: &str) -> ProviderResult<()>;

    async fn recover_password(&self, email: &str, redirect_to: &str) -> ProviderResult<()>;

    async fn update_password(&self, access_token: &str, password: &str) -> ProviderResult<User>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(confirmed_at: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: Some("a@x.com".to_string()),
            email_confirmed_at: confirmed_at.map(ToString::to_string),
            created_at: None,
            updated_at: None,
            user_metadata: json!({"full_name": "  Ada Lovelace "}),
        }
    }

    #[test]
    fn confirmation_needs_a_timestamp() {
        assert!(!user(None).is_confirmed());
        assert!(!user(Some("")).is_confirmed());
        assert!(user(Some("2024-01-01T00:00:00Z")).is_confirmed());
        assert!(user(Some("2024-01-01T00:00:00Z")).view().email_confirmed);
    }

    #[test]
    fn full_name_is_trimmed() {
        assert_eq!(user(None).full_name().as_deref(), Some("Ada Lovelace"));
        let mut anonymous = user(None);
        anonymous.user_metadata = Value::Null;
        assert_eq!(anonymous.full_name(), None);
    }

    #[test]
    fn session_debug_hides_tokens() {
        let session = Session {
            access_token: "secret-access".to_string(),
            refresh_token: "secret-refresh".to_string(),
            expires_in: 3600,
            token_type: "bearer".to_string(),
            user: user(None),
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn unauthorized_statuses() {
        assert!(ProviderError::rejected(401, "bad jwt").is_unauthorized());
        assert!(ProviderError::rejected(403, "expired").is_unauthorized());
        assert!(!ProviderError::rejected(400, "weak password").is_unauthorized());
        assert!(!ProviderError::Unavailable("timeout".to_string()).is_unauthorized());
    }
}
