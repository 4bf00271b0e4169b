//! In-process provider used by the test suites.

use super::{AuthProvider, ProviderError, ProviderResult, Session, SignUpOutcome, User, VerifyKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use uuid::Uuid;

/// Timestamp stamped on every record created by the fake.
pub const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

const SESSION_TTL: u64 = 3600;
const INVALID_TOKEN: &str = "Token has expired or is invalid";

#[derive(Debug)]
struct Account {
    user: User,
    password: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    codes: HashMap<String, String>,
    token_hashes: HashMap<String, (String, VerifyKind)>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    next_code: u64,
    auto_confirm: bool,
    unavailable: bool,
    delay: Option<Duration>,
}

/// Scriptable stand-in for the hosted provider.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Issue sessions directly at signup, like projects with confirmations off.
    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.state().auto_confirm = auto_confirm;
    }

    /// Fail every call as if the provider could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Delay every call, to exercise caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// The one-time code most recently emailed to `email`, if still unused.
    #[must_use]
    pub fn issued_code(&self, email: &str) -> Option<String> {
        self.state().codes.get(email).cloned()
    }

    /// The token hash most recently emailed to `email` as a link.
    #[must_use]
    pub fn issued_token_hash(&self, email: &str) -> Option<String> {
        self.state()
            .token_hashes
            .iter()
            .find(|(_, (owner, _))| owner == email)
            .map(|(hash, _)| hash.clone())
    }

    /// Create an account with a confirmed email and return a fresh session.
    #[must_use]
    pub fn confirmed_session(&self, email: &str, password: &str) -> Session {
        let mut state = self.state();
        let user_id = state.create_account(email, Some(password), true);
        state.issue_session(user_id)
    }

    /// Create an account that has not confirmed its email yet and return a session.
    #[must_use]
    pub fn unconfirmed_session(&self, email: &str) -> Session {
        let mut state = self.state();
        let user_id = state.create_account(email, None, false);
        state.issue_session(user_id)
    }

    #[must_use]
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.state()
            .accounts
            .get(email)
            .map(|account| account.user.clone())
    }

    async fn enter(&self) -> ProviderResult<()> {
        let (unavailable, delay) = {
            let state = self.state();
            (state.unavailable, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unavailable {
            return Err(ProviderError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

impl State {
    fn create_account(&mut self, email: &str, password: Option<&str>, confirmed: bool) -> Uuid {
        let account = self
            .accounts
            .entry(email.to_string())
            .or_insert_with(|| Account {
                user: User {
                    id: Uuid::new_v4(),
                    email: Some(email.to_string()),
                    email_confirmed_at: None,
                    created_at: Some(FIXED_TIMESTAMP.to_string()),
                    updated_at: Some(FIXED_TIMESTAMP.to_string()),
                    user_metadata: json!({}),
                },
                password: None,
            });
        if let Some(password) = password {
            account.password = Some(password.to_string());
        }
        if confirmed {
            account.user.email_confirmed_at = Some(FIXED_TIMESTAMP.to_string());
        }
        account.user.id
    }

    fn user(&self, id: Uuid) -> Option<&User> {
        self.accounts
            .values()
            .map(|account| &account.user)
            .find(|user| user.id == id)
    }

    fn issue_session(&mut self, user_id: Uuid) -> Session {
        let access_token = format!("access-{}", Uuid::new_v4());
        let refresh_token = format!("refresh-{}", Uuid::new_v4());
        self.access_tokens.insert(access_token.clone(), user_id);
        self.refresh_tokens.insert(refresh_token.clone(), user_id);

        let user = self.user(user_id).cloned().unwrap_or_else(|| User {
            id: user_id,
            email: None,
            email_confirmed_at: None,
            created_at: None,
            updated_at: None,
            user_metadata: Value::Null,
        });

        Session {
            access_token,
            refresh_token,
            expires_in: SESSION_TTL,
            token_type: "bearer".to_string(),
            user,
        }
    }

    fn issue_code(&mut self, email: &str) {
        self.next_code += 1;
        let code = format!("{:06}", (self.next_code * 104_729) % 1_000_000);
        self.codes.insert(email.to_string(), code);
    }

    fn issue_token_hash(&mut self, email: &str, kind: VerifyKind) {
        self.token_hashes.retain(|_, (owner, _)| owner != email);
        self.token_hashes
            .insert(format!("pkce_{}", Uuid::new_v4().simple()), (email.to_string(), kind));
    }

    fn confirm(&mut self, email: &str) -> Option<Uuid> {
        let account = self.accounts.get_mut(email)?;
        if account.user.email_confirmed_at.is_none() {
            account.user.email_confirmed_at = Some(FIXED_TIMESTAMP.to_string());
        }
        Some(account.user.id)
    }
}

#[async_trait]
impl AuthProvider for MemoryProvider {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        _redirect_to: &str,
    ) -> ProviderResult<SignUpOutcome> {
        self.enter().await?;
        let mut state = self.state();

        if state
            .accounts
            .get(email)
            .is_some_and(|account| account.password.is_some())
        {
            return Err(ProviderError::rejected(422, "User already registered"));
        }

        let auto_confirm = state.auto_confirm;
        let user_id = state.create_account(email, Some(password), auto_confirm);
        if let (Some(full_name), Some(account)) = (full_name, state.accounts.get_mut(email)) {
            account.user.user_metadata = json!({ "full_name": full_name });
        }

        if auto_confirm {
            return Ok(SignUpOutcome::Active(state.issue_session(user_id)));
        }

        state.issue_token_hash(email, VerifyKind::Signup);
        let user = state
            .user(user_id)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("user vanished".to_string()))?;
        Ok(SignUpOutcome::Pending(user))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session> {
        self.enter().await?;
        let mut state = self.state();

        let Some(account) = state.accounts.get(email) else {
            return Err(ProviderError::rejected(400, "Invalid login credentials"));
        };
        if account.password.as_deref() != Some(password) {
            return Err(ProviderError::rejected(400, "Invalid login credentials"));
        }
        if !account.user.is_confirmed() {
            return Err(ProviderError::rejected(400, "Email not confirmed"));
        }

        let user_id = account.user.id;
        Ok(state.issue_session(user_id))
    }

    async fn send_otp(&self, email: &str, _redirect_to: &str) -> ProviderResult<()> {
        self.enter().await?;
        let mut state = self.state();
        state.create_account(email, None, false);
        state.issue_code(email);
        state.issue_token_hash(email, VerifyKind::Magiclink);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str) -> ProviderResult<Session> {
        self.enter().await?;
        let mut state = self.state();

        if state.codes.get(email).map(String::as_str) != Some(token) {
            return Err(ProviderError::rejected(403, INVALID_TOKEN));
        }
        state.codes.remove(email);

        let user_id = state
            .confirm(email)
            .ok_or_else(|| ProviderError::rejected(403, INVALID_TOKEN))?;
        Ok(state.issue_session(user_id))
    }

    async fn verify_token_hash(
        &self,
        token_hash: &str,
        kind: VerifyKind,
    ) -> ProviderResult<Session> {
        self.enter().await?;
        let mut state = self.state();

        let Some((email, issued_kind)) = state.token_hashes.remove(token_hash) else {
            return Err(ProviderError::rejected(403, INVALID_TOKEN));
        };
        // Email links are accepted for any of the email-style kinds.
        if issued_kind == VerifyKind::Recovery && kind != VerifyKind::Recovery {
            return Err(ProviderError::rejected(403, INVALID_TOKEN));
        }

        let user_id = state
            .confirm(&email)
            .ok_or_else(|| ProviderError::rejected(403, INVALID_TOKEN))?;
        Ok(state.issue_session(user_id))
    }

    async fn get_user(&self, access_token: &str) -> ProviderResult<User> {
        self.enter().await?;
        let state = self.state();

        state
            .access_tokens
            .get(access_token)
            .and_then(|id| state.user(*id))
            .cloned()
            .ok_or_else(|| ProviderError::rejected(401, "invalid JWT"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session> {
        self.enter().await?;
        let mut state = self.state();

        let Some(user_id) = state.refresh_tokens.remove(refresh_token) else {
            return Err(ProviderError::rejected(
                400,
                "Invalid Refresh Token: Refresh Token Not Found",
            ));
        };
        Ok(state.issue_session(user_id))
    }

    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        self.enter().await?;
        let mut state = self.state();

        let Some(user_id) = state.access_tokens.remove(access_token) else {
            return Err(ProviderError::rejected(401, "invalid JWT"));
        };
        state.access_tokens.retain(|_, id| *id != user_id);
        state.refresh_tokens.retain(|_, id| *id != user_id);
        Ok(())
    }

    async fn resend_signup(&self, email: &str, _redirect_to: &str) -> ProviderResult<()> {
        self.enter().await?;
        let mut state = self.state();
        if state.accounts.contains_key(email) {
            state.issue_token_hash(email, VerifyKind::Signup);
        }
        Ok(())
    }

    async fn recover_password(&self, email: &str, _redirect_to: &str) -> ProviderResult<()> {
        self.enter().await?;
        let mut state = self.state();
        // Unknown addresses succeed silently so accounts cannot be enumerated.
        if state.accounts.contains_key(email) {
            state.issue_token_hash(email, VerifyKind::Recovery);
        }
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> ProviderResult<User> {
        self.enter().await?;
        let mut state = self.state();

        let user_id = *state
            .access_tokens
            .get(access_token)
            .ok_or_else(|| ProviderError::rejected(401, "invalid JWT"))?;
        let account = state
            .accounts
            .values_mut()
            .find(|account| account.user.id == user_id)
            .ok_or_else(|| ProviderError::rejected(401, "invalid JWT"))?;
        account.password = Some(password.to_string());
        Ok(account.user.clone())
    }
}
