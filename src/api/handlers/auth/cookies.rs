//! Session, refresh and device cookies.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::error;
use ulid::Ulid;

use super::state::AuthConfig;
use crate::provider::Session;

pub const ACCESS_COOKIE_NAME: &str = "sb-access-token";
pub const REFRESH_COOKIE_NAME: &str = "sb-refresh-token";
pub const DEVICE_COOKIE_NAME: &str = "codelearn-device";

fn cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` headers carrying a provider session.
pub fn session_cookies(config: &AuthConfig, session: &Session) -> HeaderMap {
    let ttl = config.session_ttl_seconds();
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (ACCESS_COOKIE_NAME, session.access_token.as_str()),
        (REFRESH_COOKIE_NAME, session.refresh_token.as_str()),
    ] {
        match cookie(config, name, value, ttl) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(err) => error!("Failed to build {name} cookie: {err}"),
        }
    }
    headers
}

/// Expire both session cookies.
pub fn clear_session_cookies(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(value) = cookie(config, name, "", 0) {
            headers.append(SET_COOKIE, value);
        }
    }
    headers
}

/// The caller's device id, minting a new one (and its cookie) when absent.
pub fn device_id_or_new(config: &AuthConfig, headers: &HeaderMap) -> (String, Option<HeaderValue>) {
    if let Some(device_id) = device_id(headers) {
        return (device_id, None);
    }
    let device_id = Ulid::new().to_string();
    let set_cookie = cookie(
        config,
        DEVICE_COOKIE_NAME,
        &device_id,
        config.device_ttl_seconds(),
    )
    .ok();
    (device_id, set_cookie)
}

pub fn device_id(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, DEVICE_COOKIE_NAME).filter(|value| Ulid::from_string(value).is_ok())
}

/// Access token from `Authorization: Bearer` or the access cookie.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }
    read_cookie(headers, ACCESS_COOKIE_NAME)
}

pub fn refresh_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE_NAME)
}

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
