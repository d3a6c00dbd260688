use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use dfmea_core::{AnalysisRecord, RecordsResponse};
use reqwest::StatusCode;
use serde_json::Value;

use crate::StoreError;

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<AnalysisRecord>, StoreError>;

    /// Short human-readable origin, used in logs.
    fn describe(&self) -> String;
}

/// `GET <url>` returning the `{ data, count, status }` envelope.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpRecordSource {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, token })
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_records(&self) -> Result<Vec<AnalysisRecord>, StoreError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized);
        }

        let envelope: RecordsResponse = response.error_for_status()?.json().await?;
        Ok(envelope.data)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// JSON file holding either the fetch envelope or a bare array of records.
#[derive(Debug, Clone)]
pub struct FileRecordSource {
    path: PathBuf,
}

impl FileRecordSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RecordSource for FileRecordSource {
    async fn fetch_records(&self) -> Result<Vec<AnalysisRecord>, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StoreError::Read {
                path: self.path.clone(),
                source,
            })?;
        parse_records(&raw)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticRecordSource {
    records: Vec<AnalysisRecord>,
}

impl StaticRecordSource {
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for StaticRecordSource {
    async fn fetch_records(&self) -> Result<Vec<AnalysisRecord>, StoreError> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("built-in ({} records)", self.records.len())
    }
}

pub fn parse_records(raw: &str) -> Result<Vec<AnalysisRecord>, StoreError> {
    let value: Value = serde_json::from_str(raw)?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    let envelope: RecordsResponse = serde_json::from_value(value)?;
    Ok(envelope.data)
}

/// Small record set used when no records URL or file is configured.
pub fn demo_records() -> Vec<AnalysisRecord> {
    [
        ("P1", "Body", "Housing", "Case"),
        ("P1", "Body", "Housing", "Bezel"),
        ("P1", "Body", "Sealing", "Gasket"),
        ("P1", "Electronics", "Mainboard", "PCB Module"),
        ("P1", "Electronics", "Display", "LCD Panel"),
        ("P2", "Body", "Housing", "Rugged Case"),
        ("P2", "Electronics", "Antenna", "WLAN Antenna"),
        ("P2", "Power", "Battery", "Battery Pack"),
        ("P3", "Power", "Charging", "Charging Contacts"),
        ("P3", "Electronics", "Display", "Touch Panel"),
    ]
    .into_iter()
    .map(|(program, campaign, subsystem, product)| {
        AnalysisRecord::new(program, campaign, subsystem, product)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parse_records_accepts_envelope_and_bare_array() {
        let envelope = r#"{"data":[{"program":"P1","campaign":"Body","subsystem":"Housing","product":"Case"}],"count":1,"status":"ok"}"#;
        let bare = r#"[{"program":"P2","campaign":"Power","subsystem":"Battery","product":"Pack"}]"#;

        assert_eq!(
            parse_records(envelope).expect("envelope"),
            vec![AnalysisRecord::new("P1", "Body", "Housing", "Case")]
        );
        assert_eq!(parse_records(bare).expect("bare")[0].program, "P2");
        assert!(parse_records("{\"rows\":[]}").is_err());
    }

    #[tokio::test]
    async fn file_source_reads_records_and_reports_missing_files() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("records.json");
        fs::write(
            &path,
            r#"[{"program":"P1","campaign":"Body","subsystem":"Housing","product":"Case"}]"#,
        )
        .expect("write records");

        let records = FileRecordSource::new(&path)
            .fetch_records()
            .await
            .expect("read records");
        assert_eq!(records.len(), 1);

        let missing = FileRecordSource::new(temp.path().join("missing.json"))
            .fetch_records()
            .await;
        assert!(matches!(missing, Err(StoreError::Read { .. })));
    }

    #[test]
    fn demo_records_cover_the_full_cascade() {
        let records = demo_records();
        assert!(records.contains(&AnalysisRecord::new("P1", "Body", "Housing", "Case")));
        assert!(records.iter().all(|record| !record.product.is_empty()));
    }
}
