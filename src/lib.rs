//! # Codelearn (coding education backend)
//!
//! `codelearn` serves the JSON API and page shell of a coding-education site.
//! Users authenticate against a hosted auth provider (Supabase `GoTrue`), browse
//! languages, courses and lessons, submit task solutions and track progress.
//!
//! ## Sessions
//!
//! The provider issues an access/refresh token pair which is stored in two
//! `HttpOnly` cookies. The application never mutates a session itself; it only
//! reads it and calls provider operations (sign in, sign out, refresh, verify).
//!
//! ## Navigation Authority
//!
//! A single [`navigation::Navigator`] decides where a user is sent. The
//! request-time guard asks it before a page renders, and the auth event stream
//! asks it for every session change. Because both consult the same decision
//! table, the event stream only asks the client to refresh whenever the guard
//! would perform the redirect anyway.
//!
//! ## Profiles
//!
//! A profile row is created exactly once, after the email address is confirmed,
//! through an idempotent insert. Reads fall back to a synthesized default
//! profile while no row exists.

pub mod api;
pub mod cli;
pub mod grading;
pub mod navigation;
pub mod provider;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
