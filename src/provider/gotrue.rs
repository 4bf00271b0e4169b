use super::{AuthProvider, ProviderError, ProviderResult, Session, SignUpOutcome, User, VerifyKind};
use crate::APP_USER_AGENT;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// REST client for a `GoTrue` (Supabase Auth) deployment.
#[derive(Clone, Debug)]
pub struct GoTrueProvider {
    client: Client,
    base_url: Url,
    anon_key: SecretString,
}

impl GoTrueProvider {
    /// # Errors
    /// Returns an error if the project URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(project_url: &str, anon_key: SecretString, timeout: Duration) -> Result<Self> {
        let base_url = auth_base_url(project_url)?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    fn endpoint(&self, path: &str, redirect_to: Option<&str>) -> ProviderResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid endpoint {path}: {e}")))?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, access_token: Option<&str>) -> RequestBuilder {
        let bearer = access_token.unwrap_or_else(|| self.anon_key.expose_secret());
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ProviderResult<T> {
        let response = checked(request).await?;
        response.json::<T>().await.map_err(|e| {
            error!("Failed to decode auth provider response: {e}");
            ProviderError::InvalidResponse(e.to_string())
        })
    }

    async fn send_empty(&self, request: RequestBuilder) -> ProviderResult<()> {
        checked(request).await.map(|_| ())
    }
}

/// `https://project.supabase.co` becomes `https://project.supabase.co/auth/v1/`.
fn auth_base_url(project_url: &str) -> Result<Url> {
    let url = Url::parse(project_url)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(anyhow!("Error parsing URL: unsupported scheme {scheme}")),
    }

    if url.host().is_none() {
        return Err(anyhow!("Error parsing URL: no host specified"));
    }

    let mut base = url.as_str().trim_end_matches('/').to_string();
    if !base.ends_with("/auth/v1") {
        base.push_str("/auth/v1");
    }
    base.push('/');

    Ok(Url::parse(&base)?)
}

async fn checked(request: RequestBuilder) -> ProviderResult<Response> {
    let response = request.send().await.map_err(|e| {
        error!("Failed to reach auth provider: {e}");
        ProviderError::Unavailable(e.to_string())
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| status.to_string());

    debug!("auth provider responded {status}: {message}");

    if status.is_server_error() {
        return Err(ProviderError::Unavailable(format!("{status}, {message}")));
    }

    Err(ProviderError::rejected(status.as_u16(), message))
}

/// `GoTrue` has used several error envelopes over time.
fn error_message(body: &Value) -> Option<String> {
    ["msg", "error_description", "message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

#[async_trait]
impl AuthProvider for GoTrueProvider {
    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
        redirect_to: &str,
    ) -> ProviderResult<SignUpOutcome> {
        let url = self.endpoint("signup", Some(redirect_to))?;
        let mut payload = json!({
            "email": email,
            "password": password,
        });
        if let Some(full_name) = full_name {
            payload["data"] = json!({ "full_name": full_name });
        }

        let body: Value = self
            .send(self.request(Method::POST, url, None).json(&payload))
            .await?;

        // Auto-confirming projects answer with a session, others with the user.
        if body.get("access_token").is_some() {
            serde_json::from_value(body)
                .map(SignUpOutcome::Active)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
        } else {
            serde_json::from_value(body)
                .map(SignUpOutcome::Pending)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ProviderResult<Session> {
        let mut url = self.endpoint("token", None)?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let payload = json!({ "email": email, "password": password });

        self.send(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip(self))]
    async fn send_otp(&self, email: &str, redirect_to: &str) -> ProviderResult<()> {
        let url = self.endpoint("otp", Some(redirect_to))?;
        let payload = json!({ "email": email, "create_user": true });

        self.send_empty(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip(self, token))]
    async fn verify_otp(&self, email: &str, token: &str) -> ProviderResult<Session> {
        let url = self.endpoint("verify", None)?;
        let payload = json!({ "type": "email", "email": email, "token": token });

        self.send(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip(self, token_hash))]
    async fn verify_token_hash(
        &self,
        token_hash: &str,
        kind: VerifyKind,
    ) -> ProviderResult<Session> {
        let url = self.endpoint("verify", None)?;
        let payload = json!({ "type": kind.as_str(), "token_hash": token_hash });

        self.send(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> ProviderResult<User> {
        let url = self.endpoint("user", None)?;

        self.send(self.request(Method::GET, url, Some(access_token)))
            .await
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<Session> {
        let mut url = self.endpoint("token", None)?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let payload = json!({ "refresh_token": refresh_token });

        self.send(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> ProviderResult<()> {
        let url = self.endpoint("logout", None)?;

        self.send_empty(self.request(Method::POST, url, Some(access_token)))
            .await
    }

    #[instrument(skip(self))]
    async fn resend_signup(&self, email: &str, redirect_to: &str) -> ProviderResult<()> {
        let url = self.endpoint("resend", Some(redirect_to))?;
        let payload = json!({ "type": "signup", "email": email });

        self.send_empty(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip(self))]
    async fn recover_password(&self, email: &str, redirect_to: &str) -> ProviderResult<()> {
        let url = self.endpoint("recover", Some(redirect_to))?;
        let payload = json!({ "email": email });

        self.send_empty(self.request(Method::POST, url, None).json(&payload))
            .await
    }

    #[instrument(skip_all)]
    async fn update_password(&self, access_token: &str, password: &str) -> ProviderResult<User> {
        let url = self.endpoint("user", None)?;
        let payload = json!({ "password": password });

        self.send(
            self.request(Method::PUT, url, Some(access_token))
                .json(&payload),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoTrueProvider {
        GoTrueProvider::new(
            "https://project.supabase.co",
            SecretString::from("anon".to_string()),
            Duration::from_secs(1),
        )
        .expect("valid provider")
    }

    #[test]
    fn base_url_appends_auth_prefix_once() {
        let url = auth_base_url("https://project.supabase.co").expect("valid url");
        assert_eq!(url.as_str(), "https://project.supabase.co/auth/v1/");

        let url = auth_base_url("http://localhost:9999/auth/v1/").expect("valid url");
        assert_eq!(url.as_str(), "http://localhost:9999/auth/v1/");
    }

    #[test]
    fn base_url_rejects_other_schemes() {
        assert!(auth_base_url("ftp://project.supabase.co").is_err());
        assert!(auth_base_url("not a url").is_err());
    }

    #[test]
    fn endpoint_carries_redirect() {
        let url = provider()
            .endpoint("signup", Some("http://localhost:8080/auth/confirm"))
            .expect("endpoint");
        assert_eq!(url.path(), "/auth/v1/signup");
        assert_eq!(
            url.query_pairs()
                .find(|(key, _)| key == "redirect_to")
                .map(|(_, value)| value.to_string())
                .as_deref(),
            Some("http://localhost:8080/auth/confirm")
        );
    }

    #[test]
    fn error_message_envelopes() {
        assert_eq!(
            error_message(&json!({"msg": "User already registered"})).as_deref(),
            Some("User already registered")
        );
        assert_eq!(
            error_message(&json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}))
                .as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(error_message(&json!({"msg": ""})), None);
        assert_eq!(error_message(&Value::Null), None);
    }
}
