use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dfmea_config::{GatewayConfig, GatewayProviderKind};
use dfmea_core::FmeaRow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod http;
mod mock;
mod upload;

pub use http::{HttpGateway, RetryPolicy};
pub use mock::{MockGateway, MockLatency, seed_indexed_files};
pub use upload::{
    FileReceipt, IndexStatus, IndexedFile, UploadCategory, UploadError, UploadFile, UploadPolicy,
    UploadReceipt, UploadRequest, format_size,
};

/// Body of the save call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub program: String,
    pub product_category: String,
    pub subsystem: String,
    pub product: String,
    pub rows: Vec<FmeaRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway provider is http but no endpoint is configured")]
    MissingEndpoint,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gateway rejected the session token")]
    Unauthorized,
    #[error("gateway reported failure for {0}")]
    Rejected(&'static str),
    #[error("gateway is unavailable")]
    Unavailable,
    #[error("invalid upload: {0}")]
    InvalidUpload(#[from] UploadError),
    #[error("failed to lock shared resource: {0}")]
    LockPoisoned(String),
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_dfmea(&self, payload: &SavePayload) -> Result<GatewayResponse, GatewayError>;

    async fn upload_files(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError>;

    async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>, GatewayError>;

    fn provider_name(&self) -> &str;
}

pub struct LoadedGateway {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub provider_name: String,
}

pub fn load_gateway(
    config: &GatewayConfig,
    token: Option<String>,
) -> Result<LoadedGateway, GatewayError> {
    match config.provider {
        GatewayProviderKind::Mock => Ok(LoadedGateway {
            gateway: Arc::new(MockGateway::new(MockLatency::from_millis(
                config.save_latency_ms,
                config.upload_latency_ms,
            ))),
            provider_name: GatewayProviderKind::Mock.as_str().to_owned(),
        }),
        GatewayProviderKind::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or(GatewayError::MissingEndpoint)?;
            let retry = RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff: Duration::from_millis(config.backoff_ms),
            };
            let gateway = HttpGateway::new(
                endpoint,
                token,
                Duration::from_secs(config.timeout_secs),
                retry,
            )?;
            Ok(LoadedGateway {
                gateway: Arc::new(gateway),
                provider_name: GatewayProviderKind::Http.as_str().to_owned(),
            })
        }
    }
}
