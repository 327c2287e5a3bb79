use std::path::PathBuf;
use std::time::Duration;

use gasline_core::config::DEFAULT_ARTIFACT_PATH;
use gasline_core::error::AppError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Settings for `gasline-server`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub artifact_path: PathBuf,
    /// How long a read artifact is served before the file is read again.
    pub cache_ttl: Duration,
}

impl ServerConfig {
    /// Reads `GASLINE_SERVER_PORT`, `GASLINE_ARTIFACT_PATH` and
    /// `GASLINE_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("GASLINE_SERVER_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AppError::ConfigError(format!("Invalid GASLINE_SERVER_PORT '{raw}'"))
            })?,
            None => DEFAULT_PORT,
        };
        let cache_ttl = match get("GASLINE_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid GASLINE_CACHE_TTL_SECS '{raw}': must be a non-negative integer"
                ))
            })?),
            None => DEFAULT_CACHE_TTL,
        };

        Ok(Self {
            port,
            artifact_path: PathBuf::from(
                get("GASLINE_ARTIFACT_PATH").unwrap_or_else(|| DEFAULT_ARTIFACT_PATH.to_string()),
            ),
            cache_ttl,
        })
    }
}
