use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::AppError;
use crate::schema::SchemaDescriptor;

/// How a price is pulled out of the source page.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionStrategy {
    /// Render the page in a browser, then read `attribute` off the first
    /// element matching `selector`.
    DomScrape { selector: String, attribute: String },
    /// Hand the URL to the extraction service with a typed schema and a
    /// natural-language prompt.
    SchemaAi {
        descriptor: SchemaDescriptor,
        prompt: String,
    },
}

impl ExtractionStrategy {
    pub fn dom(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::DomScrape {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }

    pub fn schema(descriptor: SchemaDescriptor, prompt: impl Into<String>) -> Self {
        Self::SchemaAi {
            descriptor,
            prompt: prompt.into(),
        }
    }

    /// Confidence attached to a value produced by this strategy.
    pub fn confidence(&self) -> Confidence {
        match self {
            Self::DomScrape { .. } => Confidence::Exact,
            Self::SchemaAi { .. } => Confidence::Inferred,
        }
    }

    /// Whether this strategy drives a browser before extracting.
    pub fn needs_render(&self) -> bool {
        matches!(self, Self::DomScrape { .. })
    }
}

/// Renders the method descriptor persisted in the artifact:
/// `dom:<selector>@<attribute>` or `schema:<field>:<type>`.
impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomScrape {
                selector,
                attribute,
            } => write!(f, "dom:{selector}@{attribute}"),
            Self::SchemaAi { descriptor, .. } => write!(
                f,
                "schema:{}:{}",
                descriptor.field_name,
                descriptor.value_type.as_str()
            ),
        }
    }
}

/// One pipeline run: where to look and how.
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    source_url: Url,
    strategy: ExtractionStrategy,
}

impl ExtractionTask {
    /// Builds a task, rejecting URLs that are not absolute http(s) URLs.
    pub fn new(source_url: &str, strategy: ExtractionStrategy) -> Result<Self, AppError> {
        let parsed = Url::parse(source_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid source URL '{source_url}': {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "Source URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }
        if parsed.host_str().is_none() {
            return Err(AppError::ConfigError(format!(
                "Source URL '{source_url}' has no host"
            )));
        }

        Ok(Self {
            source_url: parsed,
            strategy,
        })
    }

    pub fn source_url(&self) -> &str {
        self.source_url.as_str()
    }

    pub fn strategy(&self) -> &ExtractionStrategy {
        &self.strategy
    }

    /// Same source, different strategy. Used for fallback attempts.
    pub fn with_strategy(&self, strategy: ExtractionStrategy) -> Self {
        Self {
            source_url: self.source_url.clone(),
            strategy,
        }
    }
}

/// HTML snapshot taken once client-side rendering settled.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    html: String,
    final_url: String,
    fingerprint: String,
}

impl RenderedDocument {
    pub fn new(html: String, final_url: impl Into<String>) -> Self {
        let fingerprint = compute_hash(&html);
        Self {
            html,
            final_url: final_url.into(),
            fingerprint,
        }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// URL after redirects.
    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    /// SHA-256 of the HTML, 64-char hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// How much a value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Read verbatim from a DOM attribute.
    Exact,
    /// Interpreted by the extraction service.
    Inferred,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::Inferred => "inferred",
        }
    }
}

/// A normalized price, in currency per gallon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedValue {
    pub value: f64,
    pub confidence: Confidence,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_method_descriptors() {
        assert_eq!(
            ExtractionStrategy::dom("#ui-id-7", "data-cost").to_string(),
            "dom:#ui-id-7@data-cost"
        );
        let schema = ExtractionStrategy::schema(
            SchemaDescriptor::new(
                "indianapolis_gas_price",
                FieldType::Number,
                "The Indianapolis gas price",
            ),
            "Extract the first value",
        );
        assert_eq!(schema.to_string(), "schema:indianapolis_gas_price:number");
        assert_eq!(schema.confidence(), Confidence::Inferred);
        assert!(!schema.needs_render());
    }

    #[test]
    fn test_task_rejects_non_http_urls() {
        let strategy = ExtractionStrategy::dom("#a", "b");
        assert!(ExtractionTask::new("https://gasprices.aaa.com/?state=IN", strategy.clone()).is_ok());

        let err = ExtractionTask::new("file:///etc/passwd", strategy.clone()).unwrap_err();
        assert!(err.to_string().contains("not allowed"));

        let err = ExtractionTask::new("not a url", strategy).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_rendered_document_fingerprint() {
        let doc = RenderedDocument::new("<html></html>".into(), "https://example.com/");
        assert_eq!(doc.fingerprint(), compute_hash("<html></html>"));
        assert_eq!(doc.final_url(), "https://example.com/");
    }

    #[test]
    fn test_confidence_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Confidence::Exact).unwrap(), "\"exact\"");
        assert_eq!(
            serde_json::to_string(&Confidence::Inferred).unwrap(),
            "\"inferred\""
        );
    }
}
