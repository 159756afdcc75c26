//! Unified API error handling with structured responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::admission::AdmissionError;
use crate::config::PersistError;
use crate::exec::DispatchError;
use crate::tiles::TileError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },

    /// Disk write failed; the in-memory change was kept.
    #[error("config write failed")]
    PersistFailed(String),

    /// A launch that passed validation but could not be started.
    #[error("{0}")]
    LaunchFailed(String),

    /// Detail is logged, never sent to the client.
    #[error("internal server error")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PersistFailed(_) | Self::LaunchFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::LaunchFailed(_) => "LAUNCH_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(detail) | ApiError::PersistFailed(detail) => {
                error!(error_code = code, detail = %detail, "API error");
            }
            ApiError::LaunchFailed(msg) => {
                warn!(error_code = code, message = %msg, "launch failed");
            }
            _ => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            ok: false,
            error: message,
            code,
        };
        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::MissingToken | AdmissionError::TokenMismatch => {
                ApiError::Unauthorized(err.to_string())
            }
            AdmissionError::RateLimited { retry_after_secs } => {
                ApiError::RateLimited { retry_after_secs }
            }
        }
    }
}

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Spawn { .. } => ApiError::LaunchFailed(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        ApiError::PersistFailed(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::from(AdmissionError::RateLimited {
            retry_after_secs: 7,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
        let body = body_json(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "rate limited");
    }

    #[tokio::test]
    async fn internal_detail_is_not_leaked() {
        let response = ApiError::internal("/secret/path exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal server error");
        assert_eq!(body["code"], "INTERNAL_ERROR");

        let response = ApiError::PersistFailed("disk full".to_string()).into_response();
        assert_eq!(body_json(response).await["error"], "config write failed");
    }

    #[test]
    fn dispatch_errors_keep_the_path() {
        let err: ApiError = DispatchError::MissingTarget {
            path: r"C:\gone.exe".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains(r"C:\gone.exe"));
    }
}
