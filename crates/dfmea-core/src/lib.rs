use serde::{Deserialize, Serialize};
use thiserror::Error;

mod cascade;
mod export;
mod role;

pub use cascade::{
    AncestorPolicy, CascadeLevel, Selection, SelectionError, options_for, product_categories,
    products, programs, subsystems,
};
pub use export::{CSV_FILE_NAME, CSV_HEADER, csv_fields, export_csv, write_csv};
pub use role::{Page, Role, Theme, User, resolve_route};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 9;

pub const SUGGESTED_PROMPTS: [&str; 3] = [
    "Analyze all failure modes",
    "Focus on safety-critical items",
    "High RPN items only",
];

pub const VIEWER_PROMPT_OPTIONS: [&str; 3] =
    ["All Failure Modes", "Critical Failures", "High Severity"];

pub const GENERATED_BY_OPTIONS: [&str; 3] = ["AI Model v1", "AI Model v2", "Manual"];

/// One flat row of the analysis index; `campaign` is shown as "Product Category".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub program: String,
    pub campaign: String,
    pub subsystem: String,
    pub product: String,
}

impl AnalysisRecord {
    pub fn new(
        program: impl Into<String>,
        campaign: impl Into<String>,
        subsystem: impl Into<String>,
        product: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            campaign: campaign.into(),
            subsystem: subsystem.into(),
            product: product.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub data: Vec<AnalysisRecord>,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Up,
    Down,
}

impl Feedback {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(format!(
                "invalid feedback '{other}', expected one of: up, down"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FmeaRow {
    pub product_category: String,
    pub product: String,
    pub subsystem: String,
    pub component: String,
    pub function: String,
    pub failure_mode: String,
    pub effect: String,
    pub severity: u8,
    pub occurrence: u8,
    pub detection: u8,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl FmeaRow {
    /// Risk priority number: severity × occurrence × detection.
    pub fn rpn(&self) -> u16 {
        u16::from(self.severity) * u16::from(self.occurrence) * u16::from(self.detection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("{field} must be between 1 and 9, got {value}")]
    RatingOutOfRange { field: &'static str, value: u8 },
    #[error("{0} is required")]
    EmptyField(&'static str),
}

pub fn validate_row(row: &FmeaRow) -> Result<(), RowError> {
    let text_fields = [
        ("productCategory", &row.product_category),
        ("product", &row.product),
        ("subsystem", &row.subsystem),
        ("component", &row.component),
        ("function", &row.function),
        ("failureMode", &row.failure_mode),
        ("effect", &row.effect),
    ];
    for (name, value) in text_fields {
        if value.trim().is_empty() {
            return Err(RowError::EmptyField(name));
        }
    }

    for (field, value) in [
        ("severity", row.severity),
        ("occurrence", row.occurrence),
        ("detection", row.detection),
    ] {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(RowError::RatingOutOfRange { field, value });
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("feedback index {index} out of range for {len} rows")]
pub struct FeedbackOutOfRange {
    pub index: usize,
    pub len: usize,
}

/// Toggles feedback on one row: the same kind clears it, the other kind replaces it.
/// Returns the row's feedback after the update.
pub fn apply_feedback(
    rows: &mut [FmeaRow],
    index: usize,
    kind: Feedback,
) -> Result<Option<Feedback>, FeedbackOutOfRange> {
    let len = rows.len();
    let row = rows
        .get_mut(index)
        .ok_or(FeedbackOutOfRange { index, len })?;

    row.feedback = if row.feedback == Some(kind) {
        None
    } else {
        Some(kind)
    };
    Ok(row.feedback)
}
