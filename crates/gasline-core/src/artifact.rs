use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Confidence, ExtractedValue};

/// How an existing artifact at the target path is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Atomically replace whatever is there.
    #[default]
    Overwrite,
    /// Fail if an artifact already exists.
    CreateNew,
}

/// Result of a run before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    pub url: String,
    pub method_descriptor: String,
    pub extracted: Option<ExtractedValue>,
}

/// The persisted JSON artifact. Field order here is the key order on disk.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionArtifact {
    pub url: String,
    pub method_descriptor: String,
    pub extracted_value: Option<f64>,
    pub confidence: Option<Confidence>,
    #[serde(with = "iso8601_millis")]
    pub captured_at: DateTime<Utc>,
}

impl IngestionArtifact {
    fn stamp(record: &ArtifactRecord, captured_at: DateTime<Utc>) -> Self {
        Self {
            url: record.url.clone(),
            method_descriptor: record.method_descriptor.clone(),
            extracted_value: record.extracted.map(|v| v.value),
            confidence: record.extracted.map(|v| v.confidence),
            captured_at,
        }
    }

    /// Serializes to the on-disk form: pretty JSON with a trailing newline.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, AppError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Source of the `capturedAt` timestamp.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Persists one artifact per run at a fixed path.
///
/// `capturedAt` is taken when [`ArtifactWriter::write`] is called, not when
/// the value was extracted, so a slow render does not backdate the ingestion.
#[derive(Clone)]
pub struct ArtifactWriter {
    path: PathBuf,
    mode: WriteMode,
    clock: Clock,
}

impl ArtifactWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: WriteMode::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Stamps `record` with the current time and writes it to disk.
    pub async fn write(&self, record: &ArtifactRecord) -> Result<IngestionArtifact, AppError> {
        let artifact = IngestionArtifact::stamp(record, (self.clock)());
        let bytes = artifact.to_json_bytes()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::PersistenceError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        match self.mode {
            WriteMode::Overwrite => self.replace_atomically(&bytes).await?,
            WriteMode::CreateNew => self.create_new(&bytes).await?,
        }

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Artifact written");
        Ok(artifact)
    }

    async fn replace_atomically(&self, bytes: &[u8]) -> Result<(), AppError> {
        let tmp = self.temp_path();

        let result = match write_synced(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
                AppError::PersistenceError(format!(
                    "Failed to move artifact into place at {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) => Err(AppError::PersistenceError(format!(
                "Failed to write {}: {e}",
                tmp.display()
            ))),
        };

        // A partial temp file must not outlive a failed run.
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn create_new(&self, bytes: &[u8]) -> Result<(), AppError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                AppError::PersistenceError(format!(
                    "Failed to create {}: {e}",
                    self.path.display()
                ))
            })?;

        file.write_all(bytes).await.map_err(|e| {
            AppError::PersistenceError(format!("Failed to write {}: {e}", self.path.display()))
        })?;
        file.flush().await.map_err(|e| {
            AppError::PersistenceError(format!("Failed to flush {}: {e}", self.path.display()))
        })
    }

    /// Sibling of the target so the final rename stays on one filesystem.
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact.json");
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4().simple()))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Reads an artifact previously written by [`ArtifactWriter`].
pub async fn read_artifact(path: impl AsRef<Path>) -> Result<IngestionArtifact, AppError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::PersistenceError(format!("Failed to read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// ISO-8601 in UTC with millisecond precision and a `Z` suffix.
mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 30, 5).unwrap()
    }

    fn exact_record(value: f64) -> ArtifactRecord {
        ArtifactRecord {
            url: "https://gasprices.aaa.com/?state=IN".into(),
            method_descriptor: "dom:#ui-id-7@data-cost".into(),
            extracted: Some(ExtractedValue {
                value,
                confidence: Confidence::Exact,
            }),
        }
    }

    #[tokio::test]
    async fn writes_stable_key_order_and_iso_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        let writer = ArtifactWriter::new(&path).with_clock(fixed_time);

        writer.write(&exact_record(3.47)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let expected = "{\n  \"url\": \"https://gasprices.aaa.com/?state=IN\",\n  \"methodDescriptor\": \"dom:#ui-id-7@data-cost\",\n  \"extractedValue\": 3.47,\n  \"confidence\": \"exact\",\n  \"capturedAt\": \"2026-10-19T14:30:05.000Z\"\n}\n";
        assert_eq!(text, expected);
    }

    #[tokio::test]
    async fn absent_value_serializes_as_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        let writer = ArtifactWriter::new(&path).with_clock(fixed_time);

        let record = ArtifactRecord {
            extracted: None,
            ..exact_record(0.0)
        };
        writer.write(&record).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["extractedValue"].is_null());
        assert!(json["confidence"].is_null());
        assert_eq!(json["methodDescriptor"], "dom:#ui-id-7@data-cost");
        assert_eq!(json["capturedAt"], "2026-10-19T14:30:05.000Z");
    }

    #[tokio::test]
    async fn round_trip_preserves_value_and_confidence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        let writer = ArtifactWriter::new(&path);

        let written = writer.write(&exact_record(3.47)).await.unwrap();
        let read = read_artifact(&path).await.unwrap();

        assert_eq!(read.extracted_value, Some(3.47));
        assert_eq!(read.confidence, Some(Confidence::Exact));
        assert_eq!(read.extracted_value, written.extracted_value);
        // Timestamps survive at millisecond precision.
        assert_eq!(
            read.captured_at.timestamp_millis(),
            written.captured_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        let writer = ArtifactWriter::new(&path);

        writer.write(&exact_record(3.47)).await.unwrap();
        writer.write(&exact_record(3.51)).await.unwrap();

        let read = read_artifact(&path).await.unwrap();
        assert_eq!(read.extracted_value, Some(3.51));

        // No temp files left behind.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn create_new_refuses_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        let writer = ArtifactWriter::new(&path).with_mode(WriteMode::CreateNew);

        writer.write(&exact_record(3.47)).await.unwrap();
        let err = writer.write(&exact_record(3.51)).await.unwrap_err();

        assert!(matches!(err, AppError::PersistenceError(_)));
        let read = read_artifact(&path).await.unwrap();
        assert_eq!(read.extracted_value, Some(3.47));
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("nested").join("gas_price.json");

        ArtifactWriter::new(&path)
            .write(&exact_record(3.47))
            .await
            .unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn unwritable_location_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let err = ArtifactWriter::new(blocker.join("gas_price.json"))
            .write(&exact_record(3.47))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PersistenceError(_)));
    }

    #[tokio::test]
    async fn failed_overwrite_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gas_price.json");
        // A non-empty directory where the artifact should go makes the final
        // step fail after the temp file has been fully written.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = ArtifactWriter::new(&path)
            .write(&exact_record(3.47))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PersistenceError(_)));
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["gas_price.json".to_string()]);
    }

    #[tokio::test]
    async fn read_missing_artifact_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let err = read_artifact(dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PersistenceError(_)));
    }
}
