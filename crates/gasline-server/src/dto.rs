use serde::Serialize;

use gasline_core::artifact::IngestionArtifact;

/// Unit reported alongside every price.
pub const PRICE_UNITS: &str = "USD/GAL";

// ---------------------------------------------------------------------------
// Gas price
// ---------------------------------------------------------------------------

/// Envelope matching the EIA petroleum price series consumers already read
/// (`response.data[0].value`).
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GasPriceResponse {
    pub response: GasPriceSeries,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GasPriceSeries {
    pub data: Vec<GasPricePoint>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GasPricePoint {
    /// Capture date, `YYYY-MM-DD` (UTC).
    pub period: String,
    pub value: f64,
    pub units: &'static str,
    /// `exact` or `inferred`.
    pub confidence: Option<&'static str>,
    /// Page the value was captured from.
    pub source: String,
}

impl GasPriceResponse {
    /// `None` when the artifact carries no value.
    pub fn from_artifact(artifact: &IngestionArtifact) -> Option<Self> {
        let value = artifact.extracted_value?;
        Some(Self {
            response: GasPriceSeries {
                data: vec![GasPricePoint {
                    period: artifact.captured_at.format("%Y-%m-%d").to_string(),
                    value,
                    units: PRICE_UNITS,
                    confidence: artifact.confidence.map(|c| c.as_str()),
                    source: artifact.url.clone(),
                }],
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub artifact: &'static str,
    /// When the served artifact was captured, if one is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
