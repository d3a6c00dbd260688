use std::time::{SystemTime, UNIX_EPOCH};

use dfmea_core::{CascadeLevel, FeedbackOutOfRange, SelectionError};
use dfmea_gateway::{GatewayError, UploadError};
use dfmea_infer::InferError;
use dfmea_store::StoreError;
use thiserror::Error;

mod context;
mod notify;
mod page;
mod session;
mod upload;

pub use context::{AppContext, AuthError};
pub use notify::{CollectingNotifier, Notification, Notifier, NullNotifier};
pub use page::PageVariant;
pub use session::{DfmeaSession, SaveOutcome, SessionDeps, SessionSettings, SessionSnapshot};
pub use upload::{AddProgrammeDialog, UploadField, UploadForm};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("select program, product category, subsystem and product first")]
    IncompleteSelection,
    #[error("{} accepts a single value on this page", .0.label())]
    MultipleValues(CascadeLevel),
    #[error("'{value}' is not an available {}", .level.label())]
    UnknownOption { level: CascadeLevel, value: String },
    #[error("no generated rows")]
    NoRows,
    #[error("prompts are available once the selection is complete")]
    PromptUnavailable,
    #[error("programme name is empty")]
    EmptyProgramme,
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0} already in progress")]
    Busy(&'static str),
    #[error("discarded {0} result for an outdated selection")]
    StaleResult(&'static str),
    #[error(transparent)]
    FeedbackOutOfRange(#[from] FeedbackOutOfRange),
    #[error("{action} is not available on the {page} page")]
    Forbidden {
        page: &'static str,
        action: &'static str,
    },
    #[error("generation failed: {0}")]
    Infer(#[from] InferError),
    #[error("gateway call failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("records unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("failed to lock session state: {0}")]
    LockPoisoned(String),
}

impl SessionError {
    /// A service rejected the session token; the host signs the user out.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Store(err) => err.is_unauthorized(),
            Self::Gateway(GatewayError::Unauthorized) => true,
            _ => false,
        }
    }
}

impl From<SelectionError> for SessionError {
    fn from(err: SelectionError) -> Self {
        Self::Validation(ValidationError::Selection(err))
    }
}

impl From<UploadError> for SessionError {
    fn from(err: UploadError) -> Self {
        Self::Validation(ValidationError::Upload(err))
    }
}

pub(crate) fn current_unix_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
