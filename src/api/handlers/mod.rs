//! API handlers and shared request validation.

pub mod auth;
pub mod content;
pub mod health;
pub mod pages;
pub mod progress;

use axum::Json;
use regex::Regex;

use crate::api::error::ApiError;

pub const INVALID_BODY: &str = "Invalid request body";
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Trim and lowercase an email before it reaches the provider.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lightweight email sanity check; the provider does the real validation.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// One-time codes are exactly six ASCII digits.
pub fn valid_otp(otp: &str) -> bool {
    Regex::new(r"^\d{6}$").is_ok_and(|re| re.is_match(otp))
}

/// Unwrap an optional JSON body, 400 when it is missing or malformed.
pub(crate) fn require_body<T>(payload: Option<Json<T>>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .ok_or_else(|| ApiError::bad_request(INVALID_BODY))
}

/// Normalize and check an email field, with `missing` as the empty-field message.
pub(crate) fn checked_email(email: &str, missing: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ApiError::bad_request(missing));
    }
    if !valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("a@x.com"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("a.x.com"));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("a b@x.com"));
    }

    #[test]
    fn valid_password_counts_characters() {
        assert!(valid_password("longenough1"));
        assert!(valid_password("12345678"));
        assert!(!valid_password("short"));
    }

    #[test]
    fn valid_otp_needs_six_digits() {
        assert!(valid_otp("123456"));
        assert!(!valid_otp("12345"));
        assert!(!valid_otp("1234567"));
        assert!(!valid_otp("12a456"));
    }

    #[test]
    fn checked_email_messages() {
        assert_eq!(
            checked_email(" ", "Email is required").unwrap_err().to_string(),
            "Email is required"
        );
        assert_eq!(
            checked_email("nope", "Email is required").unwrap_err().to_string(),
            "Invalid email address"
        );
        assert_eq!(checked_email("A@X.com", "x").unwrap(), "a@x.com");
    }

    #[test]
    fn missing_body_is_bad_request() {
        let err = require_body::<()>(None).unwrap_err();
        assert_eq!(err.to_string(), INVALID_BODY);
    }
}
