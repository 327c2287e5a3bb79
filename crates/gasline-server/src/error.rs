use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use gasline_core::error::AppError;

use crate::dto::ErrorResponse;

/// Errors a handler can return.
pub enum ApiError {
    /// No usable price: the artifact is missing, unreadable, or null.
    PriceUnavailable(String),
    App(AppError),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::PersistenceError(msg) => Self::PriceUnavailable(msg),
            AppError::SerializationError(e) => {
                Self::PriceUnavailable(format!("Artifact is not valid JSON: {e}"))
            }
            other => Self::App(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::PriceUnavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "price_unavailable", message)
            }
            ApiError::App(err) => {
                let (status, error_type) = match &err {
                    AppError::ConfigError(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "config_error")
                    }
                    AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                (status, error_type, err.to_string())
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
