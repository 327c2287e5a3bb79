//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` or atomics for interior mutability,
//! allowing test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::RenderedDocument;
use crate::pipeline::{PipelineEvent, PipelineReporter, Stage};
use crate::schema::SchemaDescriptor;
use crate::traits::{DomExtractor, Renderer, SchemaExtractor};

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Increments a counter when dropped. Stands in for a browser process.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock renderer that returns queued responses and counts how many
/// "browser handles" it acquired and released.
#[derive(Clone)]
pub struct MockRenderer {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// Never complete; only a dropped future ends the call.
    hang: bool,
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl MockRenderer {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            hang: false,
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A renderer whose page never settles.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::with_responses(Vec::new())
        }
    }
}

impl Renderer for MockRenderer {
    async fn render(&self, url: &str) -> Result<RenderedDocument, AppError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let _browser = ReleaseGuard(Arc::clone(&self.released));

        if self.hang {
            std::future::pending::<()>().await;
        }

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("<html><body>default</body></html>".to_string())
            } else {
                responses.remove(0)
            }
        };
        next.map(|html| RenderedDocument::new(html, url))
    }
}

// ---------------------------------------------------------------------------
// MockDomExtractor
// ---------------------------------------------------------------------------

/// Mock DOM extractor returning a fixed attribute value (or absence).
#[derive(Clone)]
pub struct MockDomExtractor {
    value: Option<String>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockDomExtractor {
    pub fn found(raw: &str) -> Self {
        Self {
            value: Some(raw.to_string()),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn absent() -> Self {
        Self {
            value: None,
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            value: None,
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl DomExtractor for MockDomExtractor {
    fn extract(
        &self,
        _html: &str,
        _selector: &str,
        _attribute: &str,
    ) -> Result<Option<String>, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(self.value.clone())
    }
}

// ---------------------------------------------------------------------------
// MockSchemaExtractor
// ---------------------------------------------------------------------------

/// Mock schema extractor with queued responses; records every URL it is
/// called with.
#[derive(Clone)]
pub struct MockSchemaExtractor {
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockSchemaExtractor {
    pub fn new(value: serde_json::Value) -> Self {
        Self::with_responses(vec![Ok(value)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<serde_json::Value, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// For pipelines that should never reach the schema service.
    pub fn unused() -> Self {
        Self::with_responses(Vec::new())
    }
}

impl SchemaExtractor for MockSchemaExtractor {
    async fn extract_by_schema(
        &self,
        url: &str,
        _descriptor: &SchemaDescriptor,
        _prompt: &str,
    ) -> Result<serde_json::Value, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(AppError::ConfigError(
                "MockSchemaExtractor has no queued response".into(),
            ))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records stage transitions, failures and messages.
#[derive(Default)]
pub struct RecordingReporter {
    stages: Mutex<Vec<Stage>>,
    failed_stages: Mutex<Vec<Stage>>,
    messages: Mutex<Vec<String>>,
    fallbacks: AtomicUsize,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().unwrap().clone()
    }

    /// Stages reported through `StageFailed`, in order.
    pub fn failed_stages(&self) -> Vec<Stage> {
        self.failed_stages.lock().unwrap().clone()
    }

    /// Error and absence messages, verbatim.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::SeqCst)
    }
}

impl PipelineReporter for RecordingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::StageEntered { stage } => {
                self.stages.lock().unwrap().push(stage);
            }
            PipelineEvent::StageFailed { stage, error } => {
                self.failed_stages.lock().unwrap().push(stage);
                self.messages.lock().unwrap().push(error.to_string());
            }
            PipelineEvent::ValueAbsent { reason } => {
                self.messages.lock().unwrap().push(reason.to_string());
            }
            PipelineEvent::FallbackStarted { .. } => {
                self.fallbacks.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}
