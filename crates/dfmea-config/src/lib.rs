use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dfmea_core::{AncestorPolicy, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml_edit::DocumentMut;

pub const DFMEA_DIR_NAME: &str = ".dfmea";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const DEFAULT_RECORDS_FILE_NAME: &str = "records.json";
pub const DEFAULT_RECORDS_URL_ENV: &str = "DFMEA_API_URL";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;
pub const DEFAULT_ROW_COUNT: usize = 8;
pub const DEFAULT_GENERATE_LATENCY_MS: u64 = 900;
pub const DEFAULT_REGENERATE_LATENCY_MS: u64 = 700;
pub const DEFAULT_GENERATION_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_GATEWAY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_GATEWAY_BACKOFF_MS: u64 = 250;
pub const DEFAULT_SAVE_LATENCY_MS: u64 = 800;
pub const DEFAULT_UPLOAD_LATENCY_MS: u64 = 1200;
pub const DEFAULT_MAX_FILE_BYTES: u64 = 200 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "txt", "csv", "xlsx"];

const EDITABLE_SECTIONS: [&str; 5] = ["records", "generation", "gateway", "cascade", "upload"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationProviderKind {
    /// HTTP when an endpoint is configured, mock otherwise.
    #[default]
    Auto,
    Mock,
    Http,
}

impl GenerationProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mock => "mock",
            Self::Http => "http",
        }
    }
}

impl std::str::FromStr for GenerationProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "auto" => Ok(Self::Auto),
            "mock" => Ok(Self::Mock),
            "http" => Ok(Self::Http),
            other => Err(format!(
                "invalid generation provider '{other}', expected one of: auto, mock, http"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProviderKind {
    #[default]
    Mock,
    Http,
}

impl GatewayProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Http => "http",
        }
    }
}

impl std::str::FromStr for GatewayProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "mock" => Ok(Self::Mock),
            "http" => Ok(Self::Http),
            other => Err(format!(
                "invalid gateway provider '{other}', expected one of: mock, http"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DfmeaConfig {
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_records_url_env")]
    pub url_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            url_env: default_records_url_env(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_row_count")]
    pub row_count: usize,
    #[serde(default = "default_generate_latency_ms")]
    pub generate_latency_ms: u64,
    #[serde(default = "default_regenerate_latency_ms")]
    pub regenerate_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_generation_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::Auto,
            endpoint: None,
            model: None,
            row_count: DEFAULT_ROW_COUNT,
            generate_latency_ms: DEFAULT_GENERATE_LATENCY_MS,
            regenerate_latency_ms: DEFAULT_REGENERATE_LATENCY_MS,
            seed: None,
            max_attempts: DEFAULT_GENERATION_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub provider: GatewayProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gateway_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_gateway_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_save_latency_ms")]
    pub save_latency_ms: u64,
    #[serde(default = "default_upload_latency_ms")]
    pub upload_latency_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: GatewayProviderKind::Mock,
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_GATEWAY_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_GATEWAY_BACKOFF_MS,
            save_latency_ms: DEFAULT_SAVE_LATENCY_MS,
            upload_latency_ms: DEFAULT_UPLOAD_LATENCY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CascadeConfig {
    #[serde(default)]
    pub ancestor_policy: AncestorPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_users")]
    pub users: Vec<AuthUserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserConfig {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("failed to edit config TOML: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),
    #[error("invalid config key '{0}', expected <section>.<field>")]
    InvalidKey(String),
}

pub fn dfmea_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(DFMEA_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    dfmea_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn session_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    dfmea_dir(workspace_root).join(SESSION_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DfmeaConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(DfmeaConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: DfmeaConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DfmeaConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(dfmea_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = DfmeaConfig::default();
    save_workspace_config(workspace_root, &config)?;
    Ok(config)
}

pub fn save_workspace_config(
    workspace_root: impl AsRef<Path>,
    config: &DfmeaConfig,
) -> Result<(), ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(dfmea_dir(workspace_root))?;
    let content = toml::to_string_pretty(config)?;
    fs::write(config_path(workspace_root), content)?;
    Ok(())
}

/// Sets one `<section>.<field>` scalar in place, keeping the rest of the file as written.
/// The edited document must still parse as a config before it is written back.
pub fn set_config_value(
    workspace_root: impl AsRef<Path>,
    key: &str,
    value: &str,
) -> Result<DfmeaConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    ensure_workspace_config(workspace_root)?;

    let (section, field) = key
        .split_once('.')
        .filter(|(section, field)| EDITABLE_SECTIONS.contains(section) && !field.is_empty())
        .ok_or_else(|| ConfigError::InvalidKey(key.to_owned()))?;

    let path = config_path(workspace_root);
    let raw = fs::read_to_string(&path)?;
    let mut document = raw.parse::<DocumentMut>()?;

    let table = document
        .entry(section)
        .or_insert(toml_edit::table())
        .as_table_mut()
        .ok_or_else(|| ConfigError::InvalidKey(key.to_owned()))?;
    table[field] = toml_edit::value(parse_scalar(value));

    let rendered = document.to_string();
    let parsed: DfmeaConfig = toml::from_str(&rendered)?;
    fs::write(&path, rendered)?;
    Ok(normalize_config(parsed))
}

/// Records URL from the config file, else from the environment variable it names.
pub fn resolve_records_url(records: &RecordsConfig) -> Option<String> {
    normalize_optional(records.url.clone()).or_else(|| {
        std::env::var(&records.url_env)
            .ok()
            .and_then(|value| normalize_optional(Some(value)))
    })
}

pub fn validate_config(config: &DfmeaConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.generation.row_count == 0 {
        warnings.push(ConfigWarning {
            code: "generation_row_count_zero",
            message: "generation.row_count is 0; generated tables will be empty".to_owned(),
        });
    }
    if config.generation.provider == GenerationProviderKind::Http
        && config.generation.endpoint.is_none()
    {
        warnings.push(ConfigWarning {
            code: "generation_endpoint_missing",
            message: "generation.provider is http but generation.endpoint is not set".to_owned(),
        });
    }
    if config.gateway.provider == GatewayProviderKind::Http && config.gateway.endpoint.is_none() {
        warnings.push(ConfigWarning {
            code: "gateway_endpoint_missing",
            message: "gateway.provider is http but gateway.endpoint is not set".to_owned(),
        });
    }
    if config.gateway.max_attempts == 0 {
        warnings.push(ConfigWarning {
            code: "gateway_max_attempts_zero",
            message: "gateway.max_attempts is 0; requests will be attempted once".to_owned(),
        });
    }
    if config.upload.allowed_extensions.is_empty() {
        warnings.push(ConfigWarning {
            code: "upload_no_allowed_extensions",
            message: "upload.allowed_extensions is empty; every upload will be rejected"
                .to_owned(),
        });
    }
    if config.auth.users.is_empty() {
        warnings.push(ConfigWarning {
            code: "auth_no_users",
            message: "auth.users is empty; nobody can sign in".to_owned(),
        });
    }

    let mut seen = BTreeSet::new();
    for user in &config.auth.users {
        let email = user.email.to_ascii_lowercase();
        if !seen.insert(email.clone()) {
            warnings.push(ConfigWarning {
                code: "auth_duplicate_email",
                message: format!("auth.users contains '{email}' more than once"),
            });
        }
    }

    warnings
}

fn parse_scalar(value: &str) -> toml_edit::Value {
    let trimmed = value.trim();
    if let Ok(flag) = trimmed.parse::<bool>() {
        return toml_edit::Value::from(flag);
    }
    if let Ok(number) = trimmed.parse::<i64>() {
        return toml_edit::Value::from(number);
    }
    toml_edit::Value::from(trimmed)
}

fn default_records_url_env() -> String {
    DEFAULT_RECORDS_URL_ENV.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_stale_after_secs() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}

fn default_row_count() -> usize {
    DEFAULT_ROW_COUNT
}

fn default_generate_latency_ms() -> u64 {
    DEFAULT_GENERATE_LATENCY_MS
}

fn default_regenerate_latency_ms() -> u64 {
    DEFAULT_REGENERATE_LATENCY_MS
}

fn default_generation_max_attempts() -> u32 {
    DEFAULT_GENERATION_MAX_ATTEMPTS
}

fn default_gateway_max_attempts() -> u32 {
    DEFAULT_GATEWAY_MAX_ATTEMPTS
}

fn default_gateway_backoff_ms() -> u64 {
    DEFAULT_GATEWAY_BACKOFF_MS
}

fn default_save_latency_ms() -> u64 {
    DEFAULT_SAVE_LATENCY_MS
}

fn default_upload_latency_ms() -> u64 {
    DEFAULT_UPLOAD_LATENCY_MS
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_allowed_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| (*ext).to_owned())
        .collect()
}

fn default_users() -> Vec<AuthUserConfig> {
    [
        ("1", "Alice Viewer", "viewer@dfmea.com", Role::Viewer, "viewer123"),
        ("2", "Bob Engineer", "engineer@dfmea.com", Role::Engineer, "engineer123"),
        ("3", "Carol Admin", "admin@dfmea.com", Role::Admin, "admin123"),
    ]
    .into_iter()
    .map(|(id, name, email, role, password)| AuthUserConfig {
        id: id.to_owned(),
        name: name.to_owned(),
        email: email.to_owned(),
        role,
        password: password.to_owned(),
    })
    .collect()
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_config(mut config: DfmeaConfig) -> DfmeaConfig {
    config.records.url = normalize_optional(config.records.url.take());
    config.records.path = normalize_optional(config.records.path.take());
    config.generation.endpoint = normalize_optional(config.generation.endpoint.take());
    config.generation.model = normalize_optional(config.generation.model.take());
    config.gateway.endpoint = normalize_optional(config.gateway.endpoint.take());

    let url_env = config.records.url_env.trim();
    if url_env.is_empty() {
        config.records.url_env = default_records_url_env();
    } else {
        config.records.url_env = url_env.to_owned();
    }

    config.upload.allowed_extensions = config
        .upload
        .allowed_extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    for user in &mut config.auth.users {
        user.email = user.email.trim().to_owned();
    }

    config
}
