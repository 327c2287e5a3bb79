use std::future::Future;

use crate::error::AppError;
use crate::models::RenderedDocument;
use crate::schema::SchemaDescriptor;

/// Drives a browser to a URL and snapshots the HTML once rendering settles.
///
/// Implementations own any browser process they start and must release it
/// before the returned future completes, and also when it is dropped early.
pub trait Renderer: Send + Sync + Clone {
    fn render(&self, url: &str) -> impl Future<Output = Result<RenderedDocument, AppError>> + Send;
}

/// Reads an attribute off the first element matching a CSS selector.
pub trait DomExtractor: Send + Sync + Clone {
    /// `Ok(None)` when nothing matches or the attribute is missing.
    /// `Err` only when the selector itself is invalid.
    fn extract(
        &self,
        html: &str,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>, AppError>;
}

/// Asks an external service to pull one typed field out of a page.
pub trait SchemaExtractor: Send + Sync + Clone {
    /// Returns the requested field's JSON value, already validated against
    /// the descriptor's schema.
    fn extract_by_schema(
        &self,
        url: &str,
        descriptor: &SchemaDescriptor,
        prompt: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Placeholder for pipelines that never run a schema strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchemaExtractor;

impl SchemaExtractor for NoSchemaExtractor {
    async fn extract_by_schema(
        &self,
        _url: &str,
        _descriptor: &SchemaDescriptor,
        _prompt: &str,
    ) -> Result<serde_json::Value, AppError> {
        Err(AppError::ConfigError(
            "No schema extraction service configured".into(),
        ))
    }
}

/// Placeholder for pipelines that never run a DOM strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl Renderer for NoRenderer {
    async fn render(&self, _url: &str) -> Result<RenderedDocument, AppError> {
        Err(AppError::ConfigError("No page renderer configured".into()))
    }
}
