use crate::{storage::Store, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database is healthy", body = [Health]),
        (status = 503, description = "Database is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, store: Extension<Arc<dyn Store>>) -> impl IntoResponse {
    let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
    let result = store.ping().instrument(ping_span).await.map_err(|err| {
        error!("Failed to ping database: {err:#}");
        StatusCode::SERVICE_UNAVAILABLE
    });

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    match result {
        Ok(()) => {
            debug!("Database connection is healthy");
            (StatusCode::OK, headers, body)
        }
        Err(status) => {
            debug!("Database connection is unhealthy");
            (status, headers, body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use axum::{body::to_bytes, routing::get, Router};
    use tower::ServiceExt;

    fn app(store: Arc<dyn Store>) -> Router {
        Router::new()
            .route("/health", get(health).head(health))
            .layer(Extension(store))
    }

    #[tokio::test]
    async fn healthy_store_reports_ok() -> anyhow::Result<()> {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let x_app = response
            .headers()
            .get("X-App")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(x_app.starts_with(env!("CARGO_PKG_NAME")));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["database"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_store_is_unavailable() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let response = app(Arc::new(store))
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["database"], "error");
        Ok(())
    }

    #[tokio::test]
    async fn head_has_no_body()-> anyhow::Result<()> {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::HEAD)
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }
}
