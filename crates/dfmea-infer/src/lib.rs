use std::time::Duration;

use async_trait::async_trait;
use dfmea_config::{DEFAULT_ROW_COUNT, GenerationConfig, GenerationProviderKind};
use dfmea_core::{FmeaRow, validate_row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod mock;

pub use mock::{
    COMPONENTS, EFFECTS, FAILURE_MODES, FUNCTIONS, MockGenerationProvider, MockLatency,
    MockRowGenerator,
};

const HTTP_DEFAULT_MODEL: &str = "dfmea-default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    #[default]
    Generate,
    Regenerate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub product_category: String,
    pub product: String,
    pub subsystem: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub kind: GenerationKind,
}

impl GenerationRequest {
    pub fn new(
        product_category: impl Into<String>,
        product: impl Into<String>,
        subsystem: impl Into<String>,
    ) -> Self {
        Self {
            product_category: product_category.into(),
            product: product.into(),
            subsystem: subsystem.into(),
            count: DEFAULT_ROW_COUNT,
            prompt: None,
            kind: GenerationKind::Generate,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn regenerate(mut self) -> Self {
        self.kind = GenerationKind::Regenerate;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderOverrides {
    pub provider: Option<GenerationProviderKind>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub seed: Option<u64>,
}

pub struct LoadedProvider {
    pub provider: Box<dyn GenerationProvider>,
    pub provider_name: String,
    pub model_name: String,
}

#[derive(Debug, Error)]
pub enum InferError {
    #[error("generation provider is http but no endpoint is configured")]
    MissingEndpoint,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
    #[error("failed to obtain valid rows after {attempts} attempts: {last_error}")]
    ValidationExhausted { attempts: u32, last_error: String },
    #[error("failed to lock shared resource: {0}")]
    LockPoisoned(String),
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_rows(&self, request: &GenerationRequest) -> Result<Vec<FmeaRow>, InferError>;

    fn provider_name(&self) -> &str;
}

/// Posts the request JSON to a generation endpoint and accepts either
/// `{"rows": [...]}` or a bare array of rows.
#[derive(Debug, Clone)]
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_attempts: u32,
}

impl HttpGenerationProvider {
    pub fn new(
        endpoint: String,
        model: Option<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, InferError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            model: normalize_optional(model).unwrap_or_else(|| HTTP_DEFAULT_MODEL.to_owned()),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_rows(&self, request: &GenerationRequest) -> Result<Value, InferError> {
        let mut body = serde_json::to_value(request)?;
        if let Value::Object(map) = &mut body {
            map.insert("model".to_owned(), Value::String(self.model.clone()));
        }

        let response_value: Value = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response_value)
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate_rows(&self, request: &GenerationRequest) -> Result<Vec<FmeaRow>, InferError> {
        run_row_validation_retries(self.max_attempts, || self.request_rows(request)).await
    }

    fn provider_name(&self) -> &str {
        GenerationProviderKind::Http.as_str()
    }
}

pub fn load_generation_provider(
    config: &GenerationConfig,
    overrides: ProviderOverrides,
) -> Result<LoadedProvider, InferError> {
    let selected_provider = overrides.provider.unwrap_or(config.provider);
    let selected_endpoint = first_non_empty(overrides.endpoint, config.endpoint.clone());
    let selected_model = first_non_empty(overrides.model, config.model.clone());
    let seed = overrides.seed.or(config.seed);
    let timeout = Duration::from_secs(config.timeout_secs);

    let use_http = match selected_provider {
        GenerationProviderKind::Auto => selected_endpoint.is_some(),
        GenerationProviderKind::Mock => false,
        GenerationProviderKind::Http => true,
    };

    if use_http {
        let endpoint = selected_endpoint.ok_or(InferError::MissingEndpoint)?;
        let provider =
            HttpGenerationProvider::new(endpoint, selected_model, timeout, config.max_attempts)?;
        return Ok(LoadedProvider {
            model_name: provider.model().to_owned(),
            provider: Box::new(provider),
            provider_name: GenerationProviderKind::Http.as_str().to_owned(),
        });
    }

    let latency =
        MockLatency::from_millis(config.generate_latency_ms, config.regenerate_latency_ms);
    Ok(LoadedProvider {
        provider: Box::new(MockGenerationProvider::new(seed, latency)),
        provider_name: GenerationProviderKind::Mock.as_str().to_owned(),
        model_name: "mock".to_owned(),
    })
}

async fn run_row_validation_retries<F, Fut>(
    max_attempts: u32,
    mut response_loader: F,
) -> Result<Vec<FmeaRow>, InferError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Value, InferError>>,
{
    let mut last_error = String::from("unknown validation failure");

    for attempt in 1..=max_attempts {
        let response = response_loader().await?;

        match parse_and_validate_rows(response) {
            Ok(rows) => return Ok(rows),
            Err(message) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %message,
                    "generation response rejected"
                );
                last_error = message;
            }
        }
    }

    Err(InferError::ValidationExhausted {
        attempts: max_attempts,
        last_error,
    })
}

fn parse_and_validate_rows(response: Value) -> Result<Vec<FmeaRow>, String> {
    let rows_value = match response {
        Value::Array(_) => response,
        Value::Object(mut map) => map
            .remove("rows")
            .ok_or_else(|| "response has no rows field".to_owned())?,
        other => return Err(format!("unexpected response shape: {other}")),
    };

    let mut rows: Vec<FmeaRow> =
        serde_json::from_value(rows_value).map_err(|err| err.to_string())?;
    if rows.is_empty() {
        return Err("response contained no rows".to_owned());
    }

    for (index, row) in rows.iter_mut().enumerate() {
        validate_row(row).map_err(|err| format!("row {index}: {err}"))?;
        row.feedback = None;
    }
    Ok(rows)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn first_non_empty(left: Option<String>, right: Option<String>) -> Option<String> {
    normalize_optional(left).or_else(|| normalize_optional(right))
}
