use crate::{
    api::{
        self,
        handlers::{auth::AuthConfig, pages::PageShell},
    },
    provider::GoTrueProvider,
};
use anyhow::Result;
use secrecy::SecretString;
use std::{fmt, path::PathBuf, sync::Arc, time::Duration};
use tracing::debug;

pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub web_root: Option<PathBuf>,
    pub provider_url: String,
    pub provider_anon_key: SecretString,
    pub provider_timeout_ms: u64,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub guard_timeout_ms: u64,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &"***")
            .field("web_root", &self.web_root)
            .field("provider_url", &self.provider_url)
            .field("provider_anon_key", &"***")
            .field("provider_timeout_ms", &self.provider_timeout_ms)
            .field("frontend_base_url", &self.frontend_base_url)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("guard_timeout_ms", &self.guard_timeout_ms)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the provider URL is invalid, the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let provider = GoTrueProvider::new(
        &args.provider_url,
        args.provider_anon_key,
        Duration::from_millis(args.provider_timeout_ms),
    )?;

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_guard_timeout(Duration::from_millis(args.guard_timeout_ms));

    api::new(
        args.port,
        args.dsn,
        Arc::new(provider),
        auth_config,
        PageShell::new(args.web_root),
    )
    .await
}
