use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gasline_core::artifact::{IngestionArtifact, read_artifact};
use gasline_core::error::AppError;
use moka::future::Cache;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub artifact_path: PathBuf,
    /// Holds at most the one artifact; failed reads are never cached.
    /// `None` when caching is disabled.
    cache: Option<Cache<(), Arc<IngestionArtifact>>>,
}

impl AppState {
    /// A zero `ttl` reads the file on every request.
    pub fn new(artifact_path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero())
            .then(|| Cache::builder().max_capacity(1).time_to_live(ttl).build());
        Self {
            artifact_path: artifact_path.into(),
            cache,
        }
    }

    /// The latest artifact, from cache or disk.
    pub async fn current_artifact(&self) -> Result<Arc<IngestionArtifact>, AppError> {
        let Some(cache) = &self.cache else {
            return read_artifact(&self.artifact_path).await.map(Arc::new);
        };

        let path = self.artifact_path.clone();
        cache
            .try_get_with((), async move { read_artifact(&path).await.map(Arc::new) })
            .await
            .map_err(|e| AppError::PersistenceError(e.to_string()))
    }
}
