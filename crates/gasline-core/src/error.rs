use thiserror::Error;

/// Application-wide error types for gasline.
#[derive(Error, Debug)]
pub enum AppError {
    /// The page never reached a quiescent network state in time.
    #[error("Render timed out after {0}ms")]
    RenderTimeout(u64),

    /// DNS/connection failure while navigating. `code` is a short
    /// classification such as `DNS_FAILED`.
    #[error("Navigation failed ({code}): {message}")]
    NavigationError { code: String, message: String },

    /// The browser process could not be launched or driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// The CSS selector itself could not be parsed.
    #[error("Invalid selector: {0}")]
    SelectorError(String),

    /// The extraction service explicitly reported `success: false`.
    #[error("Extraction rejected by service: {reason}")]
    ExtractionError { reason: String },

    /// Extraction service call failed at the HTTP level.
    #[error("Extraction service error (HTTP {status_code}): {message}")]
    ServiceError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Extracted JSON does not match the expected schema.
    #[error("Schema validation error: {0}")]
    SchemaValidationError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The overall run deadline expired before the stage finished.
    #[error("Run deadline of {0}ms exceeded")]
    DeadlineExceeded(u64),

    /// The run was cancelled by the caller.
    #[error("Run cancelled")]
    Cancelled,

    /// Writing or reading the artifact failed.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying on a later run.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RenderTimeout(_)
            | AppError::DeadlineExceeded(_)
            | AppError::NavigationError { .. } => true,
            AppError::ServiceError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
