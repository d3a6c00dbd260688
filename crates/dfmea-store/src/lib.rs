use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dfmea_config::{DEFAULT_RECORDS_FILE_NAME, RecordsConfig, dfmea_dir, resolve_records_url};
use dfmea_core::AnalysisRecord;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

mod source;

pub use source::{
    FileRecordSource, HttpRecordSource, RecordSource, StaticRecordSource, demo_records,
    parse_records,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("records endpoint rejected the session token")]
    Unauthorized,
    #[error("failed to read records from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("records decoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// A rejected token means the stored session is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

struct CachedRecords {
    records: Arc<Vec<AnalysisRecord>>,
    fetched_at: Instant,
}

/// Read-only record list fetched on first use and served from cache until it
/// is older than `stale_after` or explicitly invalidated.
pub struct RecordStore {
    source: Box<dyn RecordSource>,
    stale_after: Duration,
    cache: Mutex<Option<CachedRecords>>,
}

impl RecordStore {
    pub fn new(source: Box<dyn RecordSource>, stale_after: Duration) -> Self {
        Self {
            source,
            stale_after,
            cache: Mutex::new(None),
        }
    }

    pub fn from_records(records: Vec<AnalysisRecord>) -> Self {
        Self::new(
            Box::new(StaticRecordSource::new(records)),
            Duration::from_secs(dfmea_config::DEFAULT_STALE_AFTER_SECS),
        )
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub async fn records(&self) -> Result<Arc<Vec<AnalysisRecord>>, StoreError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.stale_after
        {
            return Ok(Arc::clone(&cached.records));
        }

        let records = Arc::new(self.source.fetch_records().await?);
        tracing::debug!(
            source = %self.source.describe(),
            count = records.len(),
            "fetched analysis records"
        );
        *cache = Some(CachedRecords {
            records: Arc::clone(&records),
            fetched_at: Instant::now(),
        });
        Ok(records)
    }

    pub async fn invalidate(&self) {
        self.cache.lock().await.take();
    }
}

/// Picks the record source: configured URL (or the URL environment variable),
/// then a configured file, then `.dfmea/records.json`, then the built-in set.
pub fn open_record_source(
    workspace_root: impl AsRef<Path>,
    config: &RecordsConfig,
    token: Option<String>,
) -> Result<Box<dyn RecordSource>, StoreError> {
    let workspace_root = workspace_root.as_ref();

    if let Some(url) = resolve_records_url(config) {
        let source =
            HttpRecordSource::new(url, token, Duration::from_secs(config.timeout_secs))?;
        return Ok(Box::new(source));
    }

    if let Some(path) = &config.path {
        let path = Path::new(path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace_root.join(path)
        };
        return Ok(Box::new(FileRecordSource::new(path)));
    }

    let default_file = dfmea_dir(workspace_root).join(DEFAULT_RECORDS_FILE_NAME);
    if default_file.is_file() {
        return Ok(Box::new(FileRecordSource::new(default_file)));
    }

    tracing::warn!("no records source configured, using built-in demo records");
    Ok(Box::new(StaticRecordSource::new(demo_records())))
}

pub fn open_record_store(
    workspace_root: impl AsRef<Path>,
    config: &RecordsConfig,
    token: Option<String>,
) -> Result<RecordStore, StoreError> {
    let source = open_record_source(workspace_root, config, token)?;
    Ok(RecordStore::new(
        source,
        Duration::from_secs(config.stale_after_secs),
    ))
}
