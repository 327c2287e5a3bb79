pub mod artifact;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use artifact::{ArtifactRecord, ArtifactWriter, IngestionArtifact, WriteMode, read_artifact};
pub use config::{FirecrawlSettings, PipelineConfig, RenderSettings};
pub use error::AppError;
pub use models::{
    Confidence, ExtractedValue, ExtractionStrategy, ExtractionTask, RenderedDocument, compute_hash,
};
pub use normalize::PriceBounds;
pub use pipeline::{
    IngestionPipeline, PipelineEvent, PipelineReporter, RunOutcome, Stage, TracingPipelineReporter,
};
pub use schema::{FieldType, SchemaDescriptor};
pub use traits::{DomExtractor, NoRenderer, NoSchemaExtractor, Renderer, SchemaExtractor};
