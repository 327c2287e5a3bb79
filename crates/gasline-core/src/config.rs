use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{ExtractionStrategy, ExtractionTask};
use crate::normalize::{DEFAULT_MAX_PRICE, PriceBounds};
use crate::pipeline::DEFAULT_DEADLINE;
use crate::schema::{FieldType, SchemaDescriptor};

pub const DEFAULT_SOURCE_URL: &str = "https://gasprices.aaa.com/?state=IN";
pub const DEFAULT_SELECTOR: &str = "#ui-id-7";
pub const DEFAULT_ATTRIBUTE: &str = "data-cost";
pub const DEFAULT_FIELD: &str = "indianapolis_gas_price";
pub const DEFAULT_FIELD_DESCRIPTION: &str = "The Indianapolis gas price";
pub const DEFAULT_PROMPT: &str =
    "Extract the first value in the Indianapolis table from the specified URL.";
pub const DEFAULT_ARTIFACT_PATH: &str = "data/gas_price.json";
pub const DEFAULT_FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev";

/// When a rendered page counts as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Bound on navigation plus settling.
    pub timeout: Duration,
    /// How long in-flight requests must stay at or below `max_inflight`.
    pub idle_window: Duration,
    pub max_inflight: usize,
}

impl Default for RenderSettings {
    /// 30 s timeout; at most 2 in-flight requests for 500 ms.
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            idle_window: Duration::from_millis(500),
            max_inflight: 2,
        }
    }
}

/// Credentials and endpoint for the schema extraction service.
#[derive(Clone, PartialEq, Eq)]
pub struct FirecrawlSettings {
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for FirecrawlSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirecrawlSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Which strategy a `GASLINE_STRATEGY` / `GASLINE_FALLBACK` value names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Dom,
    Schema,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dom" => Ok(StrategyKind::Dom),
            "schema" => Ok(StrategyKind::Schema),
            other => Err(format!("unknown strategy '{other}' (expected dom or schema)")),
        }
    }
}

/// Everything one `gasline run` needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_url: String,
    pub strategy: ExtractionStrategy,
    pub fallback: Option<ExtractionStrategy>,
    pub artifact_path: PathBuf,
    pub deadline: Duration,
    pub render: RenderSettings,
    pub bounds: PriceBounds,
    /// Present whenever a schema strategy is configured.
    pub firecrawl: Option<FirecrawlSettings>,
}

impl PipelineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `GASLINE_SOURCE_URL`, `GASLINE_STRATEGY` (`dom`|`schema`), `GASLINE_FALLBACK`
    /// - `GASLINE_SELECTOR`, `GASLINE_ATTRIBUTE`
    /// - `GASLINE_FIELD`, `GASLINE_FIELD_TYPE`, `GASLINE_FIELD_DESCRIPTION`, `GASLINE_PROMPT`
    /// - `GASLINE_ARTIFACT_PATH`, `GASLINE_DEADLINE_SECS`, `GASLINE_MAX_PRICE`
    /// - `GASLINE_RENDER_TIMEOUT_SECS`, `GASLINE_IDLE_WINDOW_MS`, `GASLINE_MAX_INFLIGHT`
    /// - `FIRECRAWL_API_KEY` (required for schema strategies), `FIRECRAWL_BASE_URL`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let source_url = or("GASLINE_SOURCE_URL", DEFAULT_SOURCE_URL);

        let dom = ExtractionStrategy::dom(
            or("GASLINE_SELECTOR", DEFAULT_SELECTOR),
            or("GASLINE_ATTRIBUTE", DEFAULT_ATTRIBUTE),
        );
        let value_type = match get("GASLINE_FIELD_TYPE") {
            Some(raw) => raw
                .parse::<FieldType>()
                .map_err(|e| AppError::ConfigError(format!("Invalid GASLINE_FIELD_TYPE: {e}")))?,
            None => FieldType::Number,
        };
        let schema = ExtractionStrategy::schema(
            SchemaDescriptor::new(
                or("GASLINE_FIELD", DEFAULT_FIELD),
                value_type,
                or("GASLINE_FIELD_DESCRIPTION", DEFAULT_FIELD_DESCRIPTION),
            ),
            or("GASLINE_PROMPT", DEFAULT_PROMPT),
        );
        let pick = |kind: StrategyKind| match kind {
            StrategyKind::Dom => dom.clone(),
            StrategyKind::Schema => schema.clone(),
        };

        let primary = match get("GASLINE_STRATEGY") {
            Some(raw) => parse_kind("GASLINE_STRATEGY", &raw)?,
            None => StrategyKind::Dom,
        };
        let fallback = get("GASLINE_FALLBACK")
            .map(|raw| parse_kind("GASLINE_FALLBACK", &raw))
            .transpose()?
            .filter(|kind| *kind != primary);

        let needs_service = primary == StrategyKind::Schema || fallback == Some(StrategyKind::Schema);
        let firecrawl = match get("FIRECRAWL_API_KEY") {
            Some(api_key) => Some(FirecrawlSettings {
                api_key,
                base_url: or("FIRECRAWL_BASE_URL", DEFAULT_FIRECRAWL_BASE_URL),
            }),
            None if needs_service => {
                return Err(AppError::ConfigError(
                    "FIRECRAWL_API_KEY not set. Required for the schema strategy.".into(),
                ));
            }
            None => None,
        };

        let render = RenderSettings {
            timeout: Duration::from_secs(parse_positive(
                &get,
                "GASLINE_RENDER_TIMEOUT_SECS",
                RenderSettings::default().timeout.as_secs(),
            )?),
            idle_window: Duration::from_millis(parse_positive(
                &get,
                "GASLINE_IDLE_WINDOW_MS",
                RenderSettings::default().idle_window.as_millis() as u64,
            )?),
            max_inflight: match get("GASLINE_MAX_INFLIGHT") {
                Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid GASLINE_MAX_INFLIGHT '{raw}': must be a non-negative integer"
                    ))
                })?,
                None => RenderSettings::default().max_inflight,
            },
        };

        let max_price = match get("GASLINE_MAX_PRICE") {
            Some(raw) => {
                let parsed: f64 = raw.trim().parse().map_err(|_| {
                    AppError::ConfigError(format!("Invalid GASLINE_MAX_PRICE '{raw}': must be a number"))
                })?;
                if !parsed.is_finite() || parsed <= 0.0 {
                    return Err(AppError::ConfigError(
                        "GASLINE_MAX_PRICE must be a positive finite number".into(),
                    ));
                }
                parsed
            }
            None => DEFAULT_MAX_PRICE,
        };

        let config = Self {
            source_url,
            strategy: pick(primary),
            fallback: fallback.map(pick),
            artifact_path: PathBuf::from(or("GASLINE_ARTIFACT_PATH", DEFAULT_ARTIFACT_PATH)),
            deadline: Duration::from_secs(parse_positive(
                &get,
                "GASLINE_DEADLINE_SECS",
                DEFAULT_DEADLINE.as_secs(),
            )?),
            render,
            bounds: PriceBounds::new(max_price),
            firecrawl,
        };

        // Fail fast on a malformed URL rather than at run time.
        config.task()?;
        Ok(config)
    }

    /// The task for one run of this configuration.
    pub fn task(&self) -> Result<ExtractionTask, AppError> {
        ExtractionTask::new(&self.source_url, self.strategy.clone())
    }
}

fn parse_kind(key: &str, raw: &str) -> Result<StrategyKind, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::ConfigError(format!("Invalid {key}: {e}")))
}

fn parse_positive<G>(get: &G, key: &str, default: u64) -> Result<u64, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => {
            let parsed: u64 = raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid {key} '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(format!("{key} must be at least 1")));
            }
            Ok(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<PipelineConfig, AppError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_describe_the_dom_scrape() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        assert_eq!(config.strategy, ExtractionStrategy::dom("#ui-id-7", "data-cost"));
        assert_eq!(config.fallback, None);
        assert_eq!(config.artifact_path, PathBuf::from("data/gas_price.json"));
        assert_eq!(config.deadline, Duration::from_secs(120));
        assert_eq!(config.render, RenderSettings::default());
        assert_eq!(config.bounds, PriceBounds::default());
        assert!(config.firecrawl.is_none());
    }

    #[test]
    fn schema_strategy_requires_api_key() {
        let err = config_from(&[("GASLINE_STRATEGY", "schema")]).unwrap_err();
        assert!(err.to_string().contains("FIRECRAWL_API_KEY"));

        let err = config_from(&[("GASLINE_FALLBACK", "schema")]).unwrap_err();
        assert!(err.to_string().contains("FIRECRAWL_API_KEY"));
    }

    #[test]
    fn schema_strategy_with_dom_fallback() {
        let config = config_from(&[
            ("GASLINE_STRATEGY", "schema"),
            ("GASLINE_FALLBACK", "dom"),
            ("FIRECRAWL_API_KEY", "fc-test"),
            ("GASLINE_FIELD_TYPE", "string"),
        ])
        .unwrap();

        assert_eq!(
            config.strategy.to_string(),
            "schema:indianapolis_gas_price:string"
        );
        assert_eq!(
            config.fallback,
            Some(ExtractionStrategy::dom("#ui-id-7", "data-cost"))
        );
        let firecrawl = config.firecrawl.unwrap();
        assert_eq!(firecrawl.base_url, DEFAULT_FIRECRAWL_BASE_URL);
        assert!(!format!("{firecrawl:?}").contains("fc-test"));
    }

    #[test]
    fn fallback_equal_to_primary_is_dropped() {
        let config = config_from(&[("GASLINE_FALLBACK", "dom")]).unwrap();
        assert_eq!(config.fallback, None);
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("GASLINE_SOURCE_URL", "https://example.com/prices"),
            ("GASLINE_SELECTOR", "span.price"),
            ("GASLINE_ATTRIBUTE", "data-value"),
            ("GASLINE_ARTIFACT_PATH", "/tmp/out.json"),
            ("GASLINE_DEADLINE_SECS", "15"),
            ("GASLINE_RENDER_TIMEOUT_SECS", "10"),
            ("GASLINE_IDLE_WINDOW_MS", "750"),
            ("GASLINE_MAX_INFLIGHT", "0"),
            ("GASLINE_MAX_PRICE", "12.5"),
        ])
        .unwrap();

        assert_eq!(config.task().unwrap().source_url(), "https://example.com/prices");
        assert_eq!(config.strategy.to_string(), "dom:span.price@data-value");
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.deadline, Duration::from_secs(15));
        assert_eq!(config.render.timeout, Duration::from_secs(10));
        assert_eq!(config.render.idle_window, Duration::from_millis(750));
        assert_eq!(config.render.max_inflight, 0);
        assert_eq!(config.bounds, PriceBounds::new(12.5));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("GASLINE_SELECTOR", "  ")]).unwrap();
        assert_eq!(config.strategy, ExtractionStrategy::dom("#ui-id-7", "data-cost"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for (key, value) in [
            ("GASLINE_STRATEGY", "magic"),
            ("GASLINE_DEADLINE_SECS", "0"),
            ("GASLINE_DEADLINE_SECS", "soon"),
            ("GASLINE_IDLE_WINDOW_MS", "-5"),
            ("GASLINE_MAX_INFLIGHT", "two"),
            ("GASLINE_MAX_PRICE", "-1"),
            ("GASLINE_FIELD_TYPE", "float"),
            ("GASLINE_SOURCE_URL", "ftp://example.com"),
        ] {
            let err = config_from(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, AppError::ConfigError(_)),
                "{key}={value} should be rejected"
            );
        }
    }
}
