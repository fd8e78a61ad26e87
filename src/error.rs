use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::sources::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Source not configured: {0}")]
    SourceConfig(String),

    #[error("Upstream timeout: {0}")]
    GatewayTimeout(String),

    #[error("Upstream error: {message}")]
    Upstream {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Config(_) => AppError::SourceConfig(err.to_string()),
            SourceError::Timeout { .. } => AppError::GatewayTimeout(err.to_string()),
            SourceError::Request { status_code, .. } => AppError::Upstream {
                message: err.to_string(),
                status_code,
            },
        }
    }
}

impl AppError {
    /// Status reported for an upstream failure: the provider's own status when
    /// it is an error status, otherwise a plain bad gateway.
    fn upstream_status(status_code: Option<u16>) -> StatusCode {
        status_code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AppError::Database(e) => {
                if let sqlx::Error::Database(db_err) = e
                    && db_err.is_unique_violation()
                {
                    return (
                        StatusCode::CONFLICT,
                        axum::Json(json!({ "error": "Resource already exists" })),
                    )
                        .into_response();
                }
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) | AppError::UnknownSource(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone(), None),
            AppError::SourceConfig(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Source is not configured".to_string(),
                Some(msg.clone()),
            ),
            AppError::GatewayTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "Upstream source timed out".to_string(),
                Some(msg.clone()),
            ),
            AppError::Upstream {
                message,
                status_code,
            } => (
                Self::upstream_status(*status_code),
                "Upstream source request failed".to_string(),
                Some(message.clone()),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = match details {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}
