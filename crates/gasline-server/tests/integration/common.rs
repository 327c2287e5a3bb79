use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::{TimeZone, Utc};
use gasline_core::artifact::{ArtifactRecord, ArtifactWriter};
use gasline_core::models::{Confidence, ExtractedValue};
use tempfile::TempDir;

use gasline_server::routes;
use gasline_server::state::AppState;

pub const SOURCE_URL: &str = "https://gasprices.aaa.com/?state=IN";

pub struct TestApp {
    pub router: Router,
    pub artifact_path: PathBuf,
    /// Keeps the directory alive for the duration of the test.
    _dir: TempDir,
}

/// Router over an empty temp directory with caching disabled.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with_ttl(Duration::ZERO)
}

pub fn setup_test_app_with_ttl(ttl: Duration) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let artifact_path = dir.path().join("gas_price.json");
    let state = Arc::new(AppState::new(&artifact_path, ttl));

    TestApp {
        router: routes::router(state),
        artifact_path,
        _dir: dir,
    }
}

/// Writes an artifact the way `gasline run` would, with a fixed capture time.
pub async fn write_artifact(path: &Path, extracted: Option<ExtractedValue>) {
    ArtifactWriter::new(path)
        .with_clock(|| Utc.with_ymd_and_hms(2024, 5, 13, 14, 30, 0).unwrap())
        .write(&ArtifactRecord {
            url: SOURCE_URL.to_string(),
            method_descriptor: "dom:#ui-id-7@data-cost".to_string(),
            extracted,
        })
        .await
        .expect("Failed to write artifact");
}

pub fn exact(value: f64) -> Option<ExtractedValue> {
    Some(ExtractedValue {
        value,
        confidence: Confidence::Exact,
    })
}
