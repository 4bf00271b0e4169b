use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::provider::ProviderError;

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Body of every error response.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn not_authenticated() -> Self {
        Self::Unauthorized(NOT_AUTHENTICATED.to_string())
    }

    /// Map a provider failure on an anonymous call (signup, login, OTP).
    #[must_use]
    pub fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected { message, .. } => Self::BadRequest(message),
            other => Self::Internal(other.into()),
        }
    }

    /// Map a provider failure on a call made with the caller's session.
    #[must_use]
    pub fn from_session_provider(err: ProviderError) -> Self {
        match err {
            err if err.is_unauthorized() => Self::not_authenticated(),
            other => Self::from_provider(other),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(err) => {
                error!("Unexpected error: {err:#}");
                UNEXPECTED_ERROR.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
