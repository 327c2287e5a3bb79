use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifact::{ArtifactRecord, ArtifactWriter, IngestionArtifact};
use crate::error::AppError;
use crate::models::{ExtractedValue, ExtractionStrategy, ExtractionTask};
use crate::normalize::{self, PriceBounds};
use crate::traits::{DomExtractor, Renderer, SchemaExtractor};

/// Default bound on a whole run, fallback attempt included.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

/// States of a single run.
///
/// DOM strategy: `Start → Rendering → Extracting → Writing → Done`.
/// Schema strategy skips `Rendering`. `Failed` is entered when an attempt
/// yields no value and always continues to `Writing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Rendering,
    Extracting,
    Failed,
    Writing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Rendering => "rendering",
            Stage::Extracting => "extracting",
            Stage::Failed => "failed",
            Stage::Writing => "writing",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Events emitted during a run for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    RunStarted {
        run_id: Uuid,
        url: &'a str,
        strategy: &'a ExtractionStrategy,
    },
    StageEntered {
        stage: Stage,
    },
    Rendered {
        bytes: usize,
        final_url: &'a str,
        fingerprint: &'a str,
    },
    ValueExtracted {
        value: ExtractedValue,
    },
    ValueAbsent {
        reason: &'a str,
    },
    StageFailed {
        stage: Stage,
        error: &'a AppError,
    },
    FallbackStarted {
        from: &'a ExtractionStrategy,
        to: &'a ExtractionStrategy,
    },
    ArtifactWritten {
        path: &'a Path,
        artifact: &'a IngestionArtifact,
    },
}

/// Receives pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPipelineReporter;

impl PipelineReporter for TracingPipelineReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::RunStarted {
                run_id,
                url,
                strategy,
            } => {
                tracing::info!(%run_id, %url, method = %strategy, "Ingestion run started");
            }
            PipelineEvent::StageEntered { stage } => {
                tracing::debug!(%stage, "Stage entered");
            }
            PipelineEvent::Rendered {
                bytes,
                final_url,
                fingerprint,
            } => {
                tracing::info!(
                    bytes,
                    %final_url,
                    fingerprint = %&fingerprint[..fingerprint.len().min(8)],
                    "Page rendered"
                );
            }
            PipelineEvent::ValueExtracted { value } => {
                tracing::info!(value = value.value, confidence = ?value.confidence, "Price extracted");
            }
            PipelineEvent::ValueAbsent { reason } => {
                tracing::warn!(%reason, "No usable price extracted");
            }
            PipelineEvent::StageFailed { stage, error } => match error {
                AppError::ExtractionError { reason } => {
                    tracing::warn!(%stage, %reason, "Extraction service rejected the request");
                }
                _ => {
                    tracing::warn!(
                        %stage,
                        %error,
                        retryable = error.is_retryable(),
                        "Stage failed"
                    );
                }
            },
            PipelineEvent::FallbackStarted { from, to } => {
                tracing::info!(
                    from = %from,
                    to = %to,
                    "Primary strategy produced no value, trying fallback (opt-in enhancement)"
                );
            }
            PipelineEvent::ArtifactWritten { path, artifact } => {
                tracing::info!(
                    path = %path.display(),
                    value = ?artifact.extracted_value,
                    method = %artifact.method_descriptor,
                    "Artifact written"
                );
            }
        }
    }
}

/// What a finished run left behind.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub artifact: IngestionArtifact,
    /// One message per attempt that produced no value, in attempt order.
    pub failures: Vec<String>,
}

impl RunOutcome {
    pub fn has_value(&self) -> bool {
        self.artifact.extracted_value.is_some()
    }
}

enum Extraction {
    Value(ExtractedValue),
    Absent(String),
}

/// Tracks the current stage so a deadline or cancellation can be attributed.
struct StageCursor<'r, WR: PipelineReporter> {
    reporter: &'r WR,
    current: Mutex<Stage>,
}

impl<'r, WR: PipelineReporter> StageCursor<'r, WR> {
    fn new(reporter: &'r WR) -> Self {
        Self {
            reporter,
            current: Mutex::new(Stage::Start),
        }
    }

    fn enter(&self, stage: Stage) {
        if let Ok(mut current) = self.current.lock() {
            *current = stage;
        }
        self.reporter.report(PipelineEvent::StageEntered { stage });
    }

    fn current(&self) -> Stage {
        self.current.lock().map(|s| *s).unwrap_or(Stage::Start)
    }

    fn report(&self, event: PipelineEvent<'_>) {
        self.reporter.report(event);
    }
}

/// Orchestrates one ingestion run: extract with the task's strategy
/// (optionally falling back to a second one), normalize, write the artifact.
///
/// Generic over all external dependencies via traits, enabling dependency
/// injection and testability without a real browser or extraction service.
///
/// Extraction failures never escape [`IngestionPipeline::run`]; they are
/// downgraded to an artifact with an absent value. Only a failed artifact
/// write is returned as an error.
pub struct IngestionPipeline<R, D, S>
where
    R: Renderer,
    D: DomExtractor,
    S: SchemaExtractor,
{
    renderer: R,
    dom: D,
    schema: S,
    writer: ArtifactWriter,
    bounds: PriceBounds,
    deadline: Duration,
    fallback: Option<ExtractionStrategy>,
}

impl<R, D, S> IngestionPipeline<R, D, S>
where
    R: Renderer,
    D: DomExtractor,
    S: SchemaExtractor,
{
    pub fn new(renderer: R, dom: D, schema: S, writer: ArtifactWriter) -> Self {
        Self {
            renderer,
            dom,
            schema,
            writer,
            bounds: PriceBounds::default(),
            deadline: DEFAULT_DEADLINE,
            fallback: None,
        }
    }

    pub fn with_bounds(mut self, bounds: PriceBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Strategy to try when the task's own strategy yields no value.
    ///
    /// Opt-in: disabled unless set.
    pub fn with_fallback(mut self, fallback: Option<ExtractionStrategy>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Run the pipeline with tracing output and no external cancellation.
    pub async fn run(&self, task: &ExtractionTask) -> Result<RunOutcome, AppError> {
        self.run_with(task, &CancellationToken::new(), &TracingPipelineReporter)
            .await
    }

    /// Run the pipeline for `task`.
    ///
    /// 1. Extract with the task's strategy (render + DOM, or schema service)
    /// 2. On no value, extract with the fallback strategy if one is set
    /// 3. Write the artifact, with an absent value if nothing was extracted
    pub async fn run_with<WR: PipelineReporter>(
        &self,
        task: &ExtractionTask,
        cancel: &CancellationToken,
        reporter: &WR,
    ) -> Result<RunOutcome, AppError> {
        let run_id = Uuid::new_v4();
        let deadline = tokio::time::Instant::now() + self.deadline;
        let cursor = StageCursor::new(reporter);

        cursor.report(PipelineEvent::RunStarted {
            run_id,
            url: task.source_url(),
            strategy: task.strategy(),
        });
        cursor.enter(Stage::Start);

        let mut attempts = vec![task.clone()];
        if let Some(fallback) = self.fallback.as_ref().filter(|f| *f != task.strategy()) {
            attempts.push(task.with_strategy(fallback.clone()));
        }

        let mut tried = Vec::with_capacity(attempts.len());
        let mut failures = Vec::new();
        let mut produced = None;

        for (i, attempt) in attempts.iter().enumerate() {
            if i > 0 {
                cursor.report(PipelineEvent::FallbackStarted {
                    from: attempts[i - 1].strategy(),
                    to: attempt.strategy(),
                });
            }
            tried.push(attempt.strategy().to_string());

            match self.attempt(attempt, deadline, cancel, &cursor).await {
                Ok(Extraction::Value(value)) => {
                    cursor.report(PipelineEvent::ValueExtracted { value });
                    produced = Some((attempt.strategy().to_string(), value));
                    break;
                }
                Ok(Extraction::Absent(reason)) => {
                    cursor.report(PipelineEvent::ValueAbsent { reason: &reason });
                    cursor.enter(Stage::Failed);
                    failures.push(reason);
                }
                Err(error) => {
                    cursor.report(PipelineEvent::StageFailed {
                        stage: cursor.current(),
                        error: &error,
                    });
                    cursor.enter(Stage::Failed);
                    let stop = matches!(error, AppError::Cancelled | AppError::DeadlineExceeded(_));
                    failures.push(error.to_string());
                    if stop {
                        break;
                    }
                }
            }
        }

        let record = match produced {
            Some((method_descriptor, value)) => ArtifactRecord {
                url: task.source_url().to_string(),
                method_descriptor,
                extracted: Some(value),
            },
            None => ArtifactRecord {
                url: task.source_url().to_string(),
                method_descriptor: tried.join(" -> "),
                extracted: None,
            },
        };

        cursor.enter(Stage::Writing);
        let artifact = match self.writer.write(&record).await {
            Ok(artifact) => artifact,
            Err(error) => {
                cursor.report(PipelineEvent::StageFailed {
                    stage: Stage::Writing,
                    error: &error,
                });
                return Err(error);
            }
        };
        cursor.report(PipelineEvent::ArtifactWritten {
            path: self.writer.path(),
            artifact: &artifact,
        });
        cursor.enter(Stage::Done);

        Ok(RunOutcome {
            run_id,
            artifact,
            failures,
        })
    }

    /// One strategy, bounded by the run deadline and the cancellation token.
    ///
    /// When either fires, the in-flight stage future is dropped, which
    /// releases any browser it holds.
    async fn attempt<WR: PipelineReporter>(
        &self,
        task: &ExtractionTask,
        deadline: tokio::time::Instant,
        cancel: &CancellationToken,
        cursor: &StageCursor<'_, WR>,
    ) -> Result<Extraction, AppError> {
        tokio::select! {
            result = tokio::time::timeout_at(deadline, self.extract(task, cursor)) => match result {
                Ok(inner) => inner,
                Err(_) => Err(AppError::DeadlineExceeded(self.deadline.as_millis() as u64)),
            },
            () = cancel.cancelled() => Err(AppError::Cancelled),
        }
    }

    async fn extract<WR: PipelineReporter>(
        &self,
        task: &ExtractionTask,
        cursor: &StageCursor<'_, WR>,
    ) -> Result<Extraction, AppError> {
        match task.strategy() {
            ExtractionStrategy::DomScrape {
                selector,
                attribute,
            } => {
                cursor.enter(Stage::Rendering);
                let document = self.renderer.render(task.source_url()).await?;
                cursor.report(PipelineEvent::Rendered {
                    bytes: document.html().len(),
                    final_url: document.final_url(),
                    fingerprint: document.fingerprint(),
                });

                cursor.enter(Stage::Extracting);
                let raw = match self.dom.extract(document.html(), selector, attribute)? {
                    Some(raw) => raw,
                    None => {
                        return Ok(Extraction::Absent(format!(
                            "No element matching '{selector}' with attribute '{attribute}'"
                        )));
                    }
                };

                Ok(match normalize::price_from_str(&raw, self.bounds) {
                    Some(value) => Extraction::Value(ExtractedValue {
                        value,
                        confidence: task.strategy().confidence(),
                    }),
                    None => Extraction::Absent(format!(
                        "Attribute '{attribute}' value {raw:?} is not a usable price"
                    )),
                })
            }
            ExtractionStrategy::SchemaAi { descriptor, prompt } => {
                cursor.enter(Stage::Extracting);
                let field = self
                    .schema
                    .extract_by_schema(task.source_url(), descriptor, prompt)
                    .await?;

                Ok(match normalize::price_from_json(&field, self.bounds) {
                    Some(value) => Extraction::Value(ExtractedValue {
                        value,
                        confidence: task.strategy().confidence(),
                    }),
                    None => Extraction::Absent(format!(
                        "Field '{}' value {field} is not a usable price",
                        descriptor.field_name
                    )),
                })
            }
        }
    }
}
