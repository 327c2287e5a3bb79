use std::time::Duration;

use gasline_core::config::FirecrawlSettings;
use gasline_core::error::AppError;
use gasline_core::schema::SchemaDescriptor;
use gasline_core::traits::SchemaExtractor;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Client for Firecrawl's `/v1/extract` endpoint.
///
/// The service renders the page itself, so callers pass only a URL, the
/// JSON Schema of the wanted object, and a natural-language prompt. Jobs
/// that are not answered inline are polled until they complete, fail, or
/// the client timeout elapses. Polling is not a retry.
#[derive(Clone)]
pub struct FirecrawlExtractor {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl FirecrawlExtractor {
    pub fn new(api_key: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, base_url, DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }

    pub fn from_settings(settings: &FirecrawlSettings) -> Result<Self, AppError> {
        Self::with_base_url(&settings.api_key, &settings.base_url)
    }

    /// Bounds a whole extraction, polling included.
    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.base_url, timeout, self.poll_interval)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn build(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
            poll_interval,
        })
    }

    async fn submit(&self, request: &ExtractRequest<'_>) -> Result<ExtractResponse, AppError> {
        let response = self
            .client
            .post(format!("{}/v1/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    async fn poll(&self, job_id: &str) -> Result<ExtractResponse, AppError> {
        let response = self
            .client
            .get(format!("{}/v1/extract/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.decode(response).await
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    async fn decode(&self, response: reqwest::Response) -> Result<ExtractResponse, AppError> {
        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            // A structured refusal carries the service's own reason.
            if let Ok(ExtractResponse {
                success: false,
                error: Some(reason),
                ..
            }) = serde_json::from_str::<ExtractResponse>(&body)
            {
                return Err(AppError::ExtractionError { reason });
            }

            return Err(AppError::ServiceError {
                message: format!("HTTP {status_code}: {body}"),
                status_code,
                retryable: status_code == 429 || status_code >= 500,
            });
        }

        response.json().await.map_err(|e| {
            AppError::HttpError(format!("Failed to parse extraction response: {e}"))
        })
    }
}

// ---- Firecrawl API types ----

#[derive(Serialize)]
struct ExtractRequest<'a> {
    urls: Vec<&'a str>,
    prompt: &'a str,
    schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

enum JobState {
    Done(serde_json::Value),
    Pending(String),
}

impl ExtractResponse {
    fn into_state(self, known_id: Option<&str>) -> Result<JobState, AppError> {
        if !self.success {
            return Err(AppError::ExtractionError {
                reason: self.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        match (self.status.as_deref(), self.data) {
            (Some(status @ ("failed" | "cancelled")), _) => Err(AppError::ExtractionError {
                reason: self
                    .error
                    .unwrap_or_else(|| format!("extraction job {status}")),
            }),
            (Some("completed"), None) => Err(AppError::ExtractionError {
                reason: self
                    .error
                    .unwrap_or_else(|| "extraction job completed without data".to_string()),
            }),
            (Some("completed") | None, Some(data)) => Ok(JobState::Done(data)),
            _ => match self.id.as_deref().or(known_id) {
                Some(id) => Ok(JobState::Pending(id.to_string())),
                None => Err(AppError::ServiceError {
                    message: "Response carried neither data nor a job id".into(),
                    status_code: 200,
                    retryable: false,
                }),
            },
        }
    }
}

impl SchemaExtractor for FirecrawlExtractor {
    async fn extract_by_schema(
        &self,
        url: &str,
        descriptor: &SchemaDescriptor,
        prompt: &str,
    ) -> Result<serde_json::Value, AppError> {
        let started = Instant::now();
        let request = ExtractRequest {
            urls: vec![url],
            prompt,
            schema: descriptor.to_json_schema(),
        };

        let mut state = self.submit(&request).await?.into_state(None)?;
        let data = loop {
            match state {
                JobState::Done(data) => break data,
                JobState::Pending(id) => {
                    if started.elapsed() + self.poll_interval > self.timeout {
                        return Err(AppError::Timeout(self.timeout.as_secs()));
                    }
                    tracing::debug!(job_id = %id, "Extraction pending, polling");
                    tokio::time::sleep(self.poll_interval).await;
                    state = self.poll(&id).await?.into_state(Some(&id))?;
                }
            }
        };

        descriptor.select_field(&data)
    }
}
