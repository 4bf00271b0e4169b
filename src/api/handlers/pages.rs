//! Frontend page shell.
//!
//! Every page route returns the same HTML document; the session guard has
//! already decided whether the request may see it.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Response},
};
use std::{path::PathBuf, sync::Arc};
use tracing::error;

use super::auth::{cookies, AuthState};

/// Page routes served with the shell.
pub const PAGE_ROUTES: &[&str] = &[
    "/",
    "/welcome",
    "/verify-email",
    "/auth",
    "/auth/*rest",
    "/dashboard",
    "/dashboard/*rest",
    "/explore",
    "/explore/*rest",
];

const BUILTIN_SHELL: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>CodeLearn</title>
</head>
<body>
<div id="app"></div>
<script>
const events = new EventSource("/api/auth/events?path=" + encodeURIComponent(location.pathname));
events.addEventListener("auth", (event) => {
  const directive = JSON.parse(event.data);
  if (directive.action === "navigate") {
    location.assign(directive.to);
  } else if (directive.action === "refresh") {
    location.reload();
  }
});
</script>
</body>
</html>
"#;

#[derive(Clone, Debug, Default)]
pub struct PageShell {
    web_root: Option<PathBuf>,
}

impl PageShell {
    #[must_use]
    pub fn new(web_root: Option<PathBuf>) -> Self {
        Self { web_root }
    }

    #[must_use]
    pub fn web_root(&self) -> Option<&PathBuf> {
        self.web_root.as_ref()
    }

    /// `index.html` from the web root, or the built-in shell.
    pub async fn index_html(&self) -> String {
        let Some(root) = &self.web_root else {
            return BUILTIN_SHELL.to_string();
        };
        let index = root.join("index.html");
        match tokio::fs::read_to_string(&index).await {
            Ok(html) => html,
            Err(err) => {
                error!("Failed to read {}: {err}", index.display());
                BUILTIN_SHELL.to_string()
            }
        }
    }
}

pub async fn page(
    auth_state: Extension<Arc<AuthState>>,
    shell: Extension<Arc<PageShell>>,
    headers: HeaderMap,
) -> Response {
    let (_, device_cookie) = cookies::device_id_or_new(auth_state.config(), &headers);
    let mut response = Html(shell.index_html().await).into_response();
    if let Some(cookie) = device_cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtin_shell_listens_for_directives() {
        let html = PageShell::default().index_html().await;
        assert!(html.contains("/api/auth/events"));
    }

    #[tokio::test]
    async fn missing_index_falls_back_to_builtin() {
        let shell = PageShell::new(Some(PathBuf::from("/nonexistent/codelearn-web")));
        assert_eq!(shell.index_html().await, BUILTIN_SHELL);
    }
}
