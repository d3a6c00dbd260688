use std::path::Path;

use chrono::NaiveDate;
use dfmea_config::UploadConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadCategory {
    Prd,
    KnowledgeBase,
    FieldRepair,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 3] = [Self::Prd, Self::KnowledgeBase, Self::FieldRepair];

    /// Multipart field name carrying files of this category.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Prd => "prd",
            Self::KnowledgeBase => "kb",
            Self::FieldRepair => "field",
        }
    }

    /// Short tag shown in the indexed file list.
    pub fn label(self) -> &'static str {
        match self {
            Self::Prd => "PRD",
            Self::KnowledgeBase => "KB",
            Self::FieldRepair => "Field",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Prd => "PRD Upload",
            Self::KnowledgeBase => "Knowledge Bank Upload",
            Self::FieldRepair => "Field Repair Data Upload",
        }
    }
}

impl std::str::FromStr for UploadCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prd" => Ok(Self::Prd),
            "kb" | "knowledge_base" => Ok(Self::KnowledgeBase),
            "field" | "field_repair" => Ok(Self::FieldRepair),
            other => Err(format!(
                "invalid upload category '{other}', expected one of: prd, kb, field"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub category: UploadCategory,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(category: UploadCategory, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            category,
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first()
            .map(|mime| mime.essence_str().to_owned())
            .unwrap_or_else(|| "application/octet-stream".to_owned())
    }

    pub fn content_hash(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}

/// Multipart upload: the four selection fields plus files tagged by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub programme: String,
    pub product_category: String,
    pub subsystem: String,
    pub product: String,
    pub files: Vec<UploadFile>,
}

impl UploadRequest {
    pub fn files_in(&self, category: UploadCategory) -> impl Iterator<Item = &UploadFile> {
        self.files.iter().filter(move |file| file.category == category)
    }

    pub fn text_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("programme", self.programme.as_str()),
            ("productCategory", self.product_category.as_str()),
            ("subsystem", self.subsystem.as_str()),
            ("product", self.product.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Processing,
    Indexed,
}

impl IndexStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReceipt {
    pub file_name: String,
    pub category: UploadCategory,
    pub size_bytes: u64,
    pub content_hash: String,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub success: bool,
    #[serde(default)]
    pub files: Vec<FileReceipt>,
}

/// One entry of the vector database file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    pub name: String,
    pub category: UploadCategory,
    pub size_bytes: u64,
    pub status: IndexStatus,
    pub date: NaiveDate,
}

impl IndexedFile {
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// `KB` below one MiB, one decimal `MB` above.
pub fn format_size(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{} KB", bytes.div_ceil(1024))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("no files attached")]
    NoFiles,
    #[error("file name is empty")]
    EmptyFileName,
    #[error("{file_name} is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        file_name: String,
        size: u64,
        limit: u64,
    },
    #[error("{file_name} has unsupported type, allowed: {allowed}")]
    DisallowedType { file_name: String, allowed: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            allowed_extensions: config.allowed_extensions.clone(),
        }
    }

    pub fn check_file(&self, file: &UploadFile) -> Result<(), UploadError> {
        if file.file_name.trim().is_empty() {
            return Err(UploadError::EmptyFileName);
        }
        if file.size() > self.max_file_bytes {
            return Err(UploadError::TooLarge {
                file_name: file.file_name.clone(),
                size: file.size(),
                limit: self.max_file_bytes,
            });
        }

        let allowed = file
            .extension()
            .is_some_and(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext));
        if !allowed {
            return Err(UploadError::DisallowedType {
                file_name: file.file_name.clone(),
                allowed: self.allowed_extensions.join(", "),
            });
        }
        Ok(())
    }

    pub fn check_request(&self, request: &UploadRequest) -> Result<(), UploadError> {
        for (name, value) in request.text_fields() {
            if value.trim().is_empty() {
                return Err(UploadError::MissingField(name));
            }
        }
        if request.files.is_empty() {
            return Err(UploadError::NoFiles);
        }
        request.files.iter().try_for_each(|file| self.check_file(file))
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}
