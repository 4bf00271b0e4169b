use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_GUARD_TIMEOUT_MS: &str = "guard-timeout-ms";

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub guard_timeout_ms: u64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .context("missing required argument: --session-ttl-seconds")?,
            guard_timeout_ms: matches
                .get_one::<u64>(ARG_GUARD_TIMEOUT_MS)
                .copied()
                .context("missing required argument: --guard-timeout-ms")?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL used for email links, CORS and cookie security")
                .env("CODELEARN_FRONTEND_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("CODELEARN_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_GUARD_TIMEOUT_MS)
                .long(ARG_GUARD_TIMEOUT_MS)
                .help("Upper bound for the page guard's session lookup in milliseconds")
                .env("CODELEARN_GUARD_TIMEOUT_MS")
                .default_value("3000")
                .value_parser(clap::value_parser!(u64)),
        )
}
