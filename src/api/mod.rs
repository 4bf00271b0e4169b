use crate::{
    api::handlers::{
        auth::{AuthConfig, AuthState},
        pages::{self, PageShell, PAGE_ROUTES},
    },
    navigation::AuthEventBus,
    provider::AuthProvider,
    storage::{PgStore, Store},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod deferred;
pub mod error;
pub mod guard;
pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    provider: Arc<dyn AuthProvider>,
    auth_config: AuthConfig,
    pages: PageShell,
) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(PgStore::connect(&dsn).await?);

    // The one bus for the life of the process; closed below on shutdown.
    let bus = AuthEventBus::new();
    let auth_state = Arc::new(AuthState::new(auth_config, provider, bus.clone()));

    let app = app(auth_state, store, pages)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
            // Ends every open event stream so their connections can drain.
            bus.shutdown();
        })
        .await?;

    Ok(())
}

/// The complete application: documented API routes, page routes behind the
/// session guard and the shared layers.
///
/// # Errors
/// Returns an error if the frontend base URL is not a valid origin.
pub fn app(auth_state: Arc<AuthState>, store: Arc<dyn Store>, pages: PageShell) -> Result<Router> {
    let frontend_origin = frontend_origin(auth_state.config().frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, openapi) = router().split_for_parts();
    let mut router =
        router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi));

    for path in PAGE_ROUTES {
        router = router.route(path, get(pages::page));
    }
    if let Some(web_root) = pages.web_root() {
        router = router.fallback_service(ServeDir::new(web_root));
    }

    let app = router
        .layer(middleware::from_fn(guard::session_guard))
        .layer(middleware::from_fn(deferred::publish_after_response))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(store))
                .layer(Extension(Arc::new(pages))),
        );

    Ok(app)
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_drops_path_and_keeps_port() -> Result<()> {
        assert_eq!(
            frontend_origin("http://localhost:8080/app/")?,
            HeaderValue::from_static("http://localhost:8080")
        );
        assert_eq!(
            frontend_origin("https://codelearn.dev")?,
            HeaderValue::from_static("https://codelearn.dev")
        );
        Ok(())
    }

    #[test]
    fn frontend_origin_needs_a_host() {
        assert!(frontend_origin("not a url").is_err());
        assert!(frontend_origin("file:///tmp/site").is_err());
    }
}
