use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gasline_client::{FirecrawlExtractor, ScraperDomExtractor};
use gasline_core::artifact::{ArtifactWriter, WriteMode, read_artifact};
use gasline_core::config::PipelineConfig;
use gasline_core::pipeline::{IngestionPipeline, TracingPipelineReporter};
use gasline_core::traits::{NoSchemaExtractor, Renderer, SchemaExtractor};

#[derive(Parser)]
#[command(name = "gasline", version, about = "Fuel price ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the current price once and write the artifact
    Run(RunArgs),

    /// Print the current artifact
    Show {
        /// Artifact to read
        #[arg(long, env = "GASLINE_ARTIFACT_PATH", default_value = "data/gas_price.json")]
        path: PathBuf,
    },
}

/// Flags mirror the environment variables of the same name; anything not
/// given here falls through to the environment and then to defaults.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Page to capture
    #[arg(long, env = "GASLINE_SOURCE_URL")]
    url: Option<String>,

    /// Primary strategy: dom or schema
    #[arg(long, env = "GASLINE_STRATEGY")]
    strategy: Option<String>,

    /// Optional second strategy tried when the first yields nothing
    #[arg(long, env = "GASLINE_FALLBACK")]
    fallback: Option<String>,

    /// CSS selector for the dom strategy
    #[arg(long, env = "GASLINE_SELECTOR")]
    selector: Option<String>,

    /// Attribute read from the selected element
    #[arg(long, env = "GASLINE_ATTRIBUTE")]
    attribute: Option<String>,

    /// Field requested from the schema service
    #[arg(long, env = "GASLINE_FIELD")]
    field: Option<String>,

    /// Where the artifact is written
    #[arg(long, env = "GASLINE_ARTIFACT_PATH")]
    artifact_path: Option<String>,

    /// Overall run deadline in seconds
    #[arg(long, env = "GASLINE_DEADLINE_SECS")]
    deadline_secs: Option<String>,

    /// Refuse to replace an existing artifact
    #[arg(long, default_value_t = false)]
    create_new: bool,
}

impl RunArgs {
    fn overrides(&self) -> HashMap<&'static str, String> {
        [
            ("GASLINE_SOURCE_URL", &self.url),
            ("GASLINE_STRATEGY", &self.strategy),
            ("GASLINE_FALLBACK", &self.fallback),
            ("GASLINE_SELECTOR", &self.selector),
            ("GASLINE_ATTRIBUTE", &self.attribute),
            ("GASLINE_FIELD", &self.field),
            ("GASLINE_ARTIFACT_PATH", &self.artifact_path),
            ("GASLINE_DEADLINE_SECS", &self.deadline_secs),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }

    fn config(&self) -> Result<PipelineConfig, gasline_core::AppError> {
        let overrides = self.overrides();
        PipelineConfig::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gasline=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await?,
        Commands::Show { path } => cmd_show(&path).await?,
    }

    Ok(())
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = args.config().context("Invalid configuration")?;
    let mode = if args.create_new {
        WriteMode::CreateNew
    } else {
        WriteMode::Overwrite
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let renderer = renderer(&config);
    match &config.firecrawl {
        Some(settings) => {
            let schema = FirecrawlExtractor::from_settings(settings)
                .context("Failed to create extraction client")?;
            execute(&config, mode, renderer, schema, &cancel).await
        }
        None => execute(&config, mode, renderer, NoSchemaExtractor, &cancel).await,
    }
}

#[cfg(feature = "browser")]
fn renderer(config: &PipelineConfig) -> impl Renderer {
    gasline_client::ChromiumRenderer::new(config.render)
}

#[cfg(not(feature = "browser"))]
fn renderer(_config: &PipelineConfig) -> impl Renderer {
    gasline_core::traits::NoRenderer
}

async fn execute<R, S>(
    config: &PipelineConfig,
    mode: WriteMode,
    renderer: R,
    schema: S,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: Renderer,
    S: SchemaExtractor,
{
    let task = config.task().context("Invalid source URL")?;
    let writer = ArtifactWriter::new(&config.artifact_path).with_mode(mode);

    let pipeline = IngestionPipeline::new(renderer, ScraperDomExtractor::new(), schema, writer)
        .with_bounds(config.bounds)
        .with_deadline(config.deadline)
        .with_fallback(config.fallback.clone());

    tracing::info!(url = %task.source_url(), strategy = %task.strategy(), "Starting run");

    let outcome = pipeline
        .run_with(&task, cancel, &TracingPipelineReporter)
        .await
        .with_context(|| {
            format!(
                "Failed to write artifact to {}",
                config.artifact_path.display()
            )
        })?;

    if !outcome.has_value() {
        tracing::warn!(
            failures = outcome.failures.len(),
            "Run finished without a value"
        );
    }

    println!("{}", serde_json::to_string_pretty(&outcome.artifact)?);
    Ok(())
}

async fn cmd_show(path: &PathBuf) -> Result<()> {
    let artifact = read_artifact(path)
        .await
        .with_context(|| format!("No readable artifact at {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}
