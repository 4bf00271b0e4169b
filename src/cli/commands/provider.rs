//! Hosted auth provider connection.

use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::fmt;

pub const ARG_PROVIDER_URL: &str = "provider-url";
pub const ARG_PROVIDER_ANON_KEY: &str = "provider-anon-key";
pub const ARG_PROVIDER_TIMEOUT_MS: &str = "provider-timeout-ms";

pub struct Options {
    pub url: String,
    pub anon_key: SecretString,
    pub timeout_ms: u64,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("url", &self.url)
            .field("anon_key", &"***")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Options {
    /// Parse provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL or key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|value| !value.trim().is_empty())
        };

        let Some(url) = non_empty(ARG_PROVIDER_URL) else {
            bail!("missing required argument: --{ARG_PROVIDER_URL}");
        };
        let Some(anon_key) = non_empty(ARG_PROVIDER_ANON_KEY) else {
            bail!("missing required argument: --{ARG_PROVIDER_ANON_KEY}");
        };

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
            timeout_ms: matches
                .get_one::<u64>(ARG_PROVIDER_TIMEOUT_MS)
                .copied()
                .unwrap_or(10_000),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROVIDER_URL)
                .long(ARG_PROVIDER_URL)
                .help("Auth provider project URL, example: https://<project>.supabase.co")
                .env("CODELEARN_PROVIDER_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PROVIDER_ANON_KEY)
                .long(ARG_PROVIDER_ANON_KEY)
                .help("Auth provider public (anon) API key")
                .env("CODELEARN_PROVIDER_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_PROVIDER_TIMEOUT_MS)
                .long(ARG_PROVIDER_TIMEOUT_MS)
                .help("Timeout for auth provider requests in milliseconds")
                .env("CODELEARN_PROVIDER_TIMEOUT_MS")
                .default_value("10000")
                .value_parser(clap::value_parser!(u64)),
        )
}
