use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::{
    FileReceipt, GatewayError, GatewayResponse, IndexStatus, IndexedFile, PersistenceGateway,
    SavePayload, UploadCategory, UploadReceipt, UploadRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLatency {
    pub save: Duration,
    pub upload: Duration,
}

impl MockLatency {
    pub const ZERO: Self = Self {
        save: Duration::ZERO,
        upload: Duration::ZERO,
    };

    pub fn from_millis(save_ms: u64, upload_ms: u64) -> Self {
        Self {
            save: Duration::from_millis(save_ms),
            upload: Duration::from_millis(upload_ms),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    saved: Vec<SavePayload>,
    uploads: Vec<UploadRequest>,
    files: Vec<IndexedFile>,
    unavailable: bool,
}

/// In-process gateway. Succeeds after a fixed delay and keeps every payload it
/// received so callers can inspect them.
#[derive(Debug)]
pub struct MockGateway {
    latency: MockLatency,
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(latency: MockLatency) -> Self {
        Self {
            latency,
            state: Mutex::new(MockState {
                files: seed_indexed_files(),
                ..MockState::default()
            }),
        }
    }

    /// While unavailable every call fails with `GatewayError::Unavailable`.
    pub fn set_available(&self, available: bool) -> Result<(), GatewayError> {
        self.lock()?.unavailable = !available;
        Ok(())
    }

    pub fn saved_payloads(&self) -> Result<Vec<SavePayload>, GatewayError> {
        Ok(self.lock()?.saved.clone())
    }

    pub fn uploads(&self) -> Result<Vec<UploadRequest>, GatewayError> {
        Ok(self.lock()?.uploads.clone())
    }

    /// Moves every `processing` file to `indexed`; returns how many changed.
    pub fn advance_indexing(&self) -> Result<usize, GatewayError> {
        let mut state = self.lock()?;
        let mut advanced = 0;
        for file in state
            .files
            .iter_mut()
            .filter(|file| file.status == IndexStatus::Processing)
        {
            file.status = IndexStatus::Indexed;
            advanced += 1;
        }
        Ok(advanced)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, GatewayError> {
        self.state
            .lock()
            .map_err(|err| GatewayError::LockPoisoned(err.to_string()))
    }

    fn ensure_available(&self) -> Result<(), GatewayError> {
        if self.lock()?.unavailable {
            return Err(GatewayError::Unavailable);
        }
        Ok(())
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new(MockLatency::ZERO)
    }
}

#[async_trait]
impl PersistenceGateway for MockGateway {
    async fn save_dfmea(&self, payload: &SavePayload) -> Result<GatewayResponse, GatewayError> {
        delay(self.latency.save).await;
        self.ensure_available()?;

        self.lock()?.saved.push(payload.clone());
        tracing::debug!(
            program = %payload.program,
            product = %payload.product,
            rows = payload.rows.len(),
            "mock gateway stored dfmea"
        );
        Ok(GatewayResponse { success: true })
    }

    async fn upload_files(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError> {
        delay(self.latency.upload).await;
        self.ensure_available()?;

        let today = Local::now().date_naive();
        let receipts: Vec<FileReceipt> = request
            .files
            .iter()
            .map(|file| FileReceipt {
                file_name: file.file_name.clone(),
                category: file.category,
                size_bytes: file.size(),
                content_hash: file.content_hash(),
                status: IndexStatus::Processing,
            })
            .collect();

        let mut state = self.lock()?;
        state.uploads.push(request.clone());
        state
            .files
            .extend(receipts.iter().map(|receipt| IndexedFile {
                name: receipt.file_name.clone(),
                category: receipt.category,
                size_bytes: receipt.size_bytes,
                status: IndexStatus::Processing,
                date: today,
            }));

        Ok(UploadReceipt {
            success: true,
            files: receipts,
        })
    }

    async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>, GatewayError> {
        self.ensure_available()?;
        Ok(self.lock()?.files.clone())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// File list the mock vector database starts with.
pub fn seed_indexed_files() -> Vec<IndexedFile> {
    use IndexStatus::{Indexed, Processing};
    use UploadCategory::{FieldRepair, KnowledgeBase, Prd};

    [
        ("PRD_TC52_v2.pdf", Prd, 1_258_291, Indexed, (2024, 1, 15)),
        ("KnowledgeBase_Antenna_Q4.docx", KnowledgeBase, 876_544, Indexed, (2024, 1, 18)),
        ("FieldRepairData_MC93.xlsx", FieldRepair, 2_516_582, Indexed, (2024, 1, 20)),
        ("PRD_ET60_Rev3.pdf", Prd, 1_003_520, Indexed, (2024, 1, 22)),
        ("KnowledgeBase_Battery.pdf", KnowledgeBase, 1_153_434, Processing, (2024, 1, 25)),
        ("FieldRepairData_TC77.csv", FieldRepair, 348_160, Indexed, (2024, 1, 26)),
        ("PRD_L10AX_Windows.pdf", Prd, 3_355_443, Indexed, (2024, 1, 28)),
        ("KnowledgeBase_Display_v1.docx", KnowledgeBase, 737_280, Indexed, (2024, 1, 30)),
    ]
    .into_iter()
    .filter_map(|(name, category, size_bytes, status, (year, month, day))| {
        Some(IndexedFile {
            name: name.to_owned(),
            category,
            size_bytes,
            status,
            date: NaiveDate::from_ymd_opt(year, month, day)?,
        })
    })
    .collect()
}
