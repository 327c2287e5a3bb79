use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::SecondsFormat;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::{GasPriceResponse, HealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/gas_price", get(gas_price))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/gas_price",
    responses(
        (status = 200, description = "Latest captured price", body = GasPriceResponse),
        (status = 503, description = "No price available", body = crate::dto::ErrorResponse),
    ),
    tag = "price"
)]
pub async fn gas_price(
    State(state): State<Arc<AppState>>,
) -> Result<axum::Json<GasPriceResponse>, ApiError> {
    let artifact = state.current_artifact().await?;

    match GasPriceResponse::from_artifact(&artifact) {
        Some(response) => Ok(axum::Json(response)),
        None => {
            tracing::debug!(
                method = %artifact.method_descriptor,
                "Latest capture has no value"
            );
            Err(ApiError::PriceUnavailable(format!(
                "Capture at {} produced no value",
                artifact
                    .captured_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
            )))
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "An artifact is readable", body = HealthResponse),
        (status = 503, description = "No readable artifact", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.current_artifact().await {
        Ok(artifact) => (
            StatusCode::OK,
            axum::Json(HealthResponse {
                status: "healthy",
                artifact: "ok",
                captured_at: Some(
                    artifact
                        .captured_at
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            }),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(HealthResponse {
                    status: "unhealthy",
                    artifact: "missing",
                    captured_at: None,
                }),
            )
        }
    }
}
