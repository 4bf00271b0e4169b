//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, currently always the
//! API server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, provider, ARG_DSN, ARG_PORT, ARG_WEB_ROOT};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let web_root = matches
        .get_one::<String>(ARG_WEB_ROOT)
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);

    let provider_opts = provider::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        web_root,
        provider_url: provider_opts.url,
        provider_anon_key: provider_opts.anon_key,
        provider_timeout_ms: provider_opts.timeout_ms,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        guard_timeout_ms: auth_opts.guard_timeout_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn blank_anon_key_is_rejected() {
        temp_env::with_vars(
            [
                ("CODELEARN_DSN", Some("postgres://user@localhost:5432/codelearn")),
                ("CODELEARN_PROVIDER_URL", Some("https://project.supabase.co")),
                ("CODELEARN_PROVIDER_ANON_KEY", Some("  ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["codelearn"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --provider-anon-key"));
                }
            },
        );
    }

    #[test]
    fn server_args_from_env() {
        temp_env::with_vars(
            [
                ("CODELEARN_DSN", Some("postgres://user@localhost:5432/codelearn")),
                ("CODELEARN_PROVIDER_URL", Some("https://project.supabase.co")),
                ("CODELEARN_PROVIDER_ANON_KEY", Some("anon-key")),
                ("CODELEARN_GUARD_TIMEOUT_MS", Some("750")),
                ("CODELEARN_WEB_ROOT", Some("/srv/web")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["codelearn"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.guard_timeout_ms, 750);
                    assert_eq!(args.web_root, Some(PathBuf::from("/srv/web")));
                    assert_eq!(args.provider_anon_key.expose_secret(), "anon-key");
                    assert!(!format!("{args:?}").contains("anon-key"));
                }
            },
        );
    }
}
