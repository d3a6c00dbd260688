use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::{
    GatewayError, GatewayResponse, IndexedFile, PersistenceGateway, SavePayload, UploadReceipt,
    UploadRequest,
};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff after `attempt` (1-based) failed, capped at five seconds.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// 5xx responses are retried; any other status is final.
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HttpGateway {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn send_with_retry<F>(
        &self,
        operation: &'static str,
        build: F,
    ) -> Result<Response, GatewayError>
    where
        F: Fn() -> Result<RequestBuilder, GatewayError> + Send + Sync,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut request = build()?;
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    return Err(GatewayError::Unauthorized);
                }
                Ok(response)
                    if is_transient_status(response.status()) && attempt < max_attempts =>
                {
                    tracing::warn!(
                        operation,
                        attempt,
                        status = %response.status(),
                        "gateway call failed, retrying"
                    );
                }
                Ok(response) => return Ok(response.error_for_status()?),
                Err(err) if is_transient_error(&err) && attempt < max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        "gateway call failed, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }

            tokio::time::sleep(self.retry.delay_after(attempt)).await;
        }
    }

    fn upload_form(request: &UploadRequest) -> Result<Form, GatewayError> {
        let mut form = Form::new();
        for (name, value) in request.text_fields() {
            form = form.text(name, value.to_owned());
        }
        for file in &request.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime_type())?;
            form = form.part(file.category.field_name(), part);
        }
        Ok(form)
    }
}

#[async_trait]
impl PersistenceGateway for HttpGateway {
    async fn save_dfmea(&self, payload: &SavePayload) -> Result<GatewayResponse, GatewayError> {
        let url = self.url("dfmea");
        let response = self
            .send_with_retry("save", || Ok(self.client.post(&url).json(payload)))
            .await?;
        Ok(response.json().await?)
    }

    async fn upload_files(&self, request: &UploadRequest) -> Result<UploadReceipt, GatewayError> {
        let url = self.url("uploads");
        let response = self
            .send_with_retry("upload", || {
                Ok(self.client.post(&url).multipart(Self::upload_form(request)?))
            })
            .await?;
        Ok(response.json().await?)
    }

    async fn list_indexed_files(&self) -> Result<Vec<IndexedFile>, GatewayError> {
        let url = self.url("files");
        let response = self
            .send_with_retry("list_files", || Ok(self.client.get(&url)))
            .await?;
        Ok(response.json().await?)
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
