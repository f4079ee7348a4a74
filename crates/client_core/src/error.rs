use shared::{domain::PhotoId, error::ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("photo of {size} bytes exceeds the {limit} byte upload limit")]
    SizeExceeded { size: u64, limit: u64 },
    #[error("store rejected {operation} with status {status}")]
    RemoteRejected {
        operation: &'static str,
        status: u16,
    },
    #[error("store request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("malformed store response: {0}")]
    Parse(String),
    #[error("photo '{0}' not found in store")]
    NotFound(PhotoId),
    #[error("publishing is not configured for this store")]
    NotConfigured,
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::SizeExceeded { .. } => ErrorCode::SizeExceeded,
            Self::RemoteRejected { .. } => ErrorCode::RemoteRejected,
            Self::Network(_) | Self::Parse(_) => ErrorCode::NetworkError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotConfigured => ErrorCode::NotConfigured,
        }
    }
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("share host rejected the message with status {0}")]
    HostRejected(u16),
    #[error("share host unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

/// Why a workflow stage failed. Only ever logged; users see a fixed message.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read upload source: {0}")]
    Read(#[from] std::io::Error),
    #[error("durable slot access failed: {0}")]
    Slot(String),
    #[error(transparent)]
    Share(#[from] ShareError),
    #[error("album has not been published")]
    NotPublished,
    #[error("no photo at position {0}")]
    NoSuchPhoto(usize),
    #[error("published address '{0}' is not a valid url")]
    InvalidAddress(String),
}

impl StageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::Read(_) | Self::Slot(_) | Self::Share(_) => ErrorCode::NetworkError,
            Self::NotPublished => ErrorCode::PreconditionFailed,
            Self::NoSuchPhoto(_) => ErrorCode::NotFound,
            Self::InvalidAddress(_) => ErrorCode::NotConfigured,
        }
    }
}

/// Rejections that happen before a workflow starts; no status is published for these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("another workflow is still running")]
    Busy,
    #[error("delete was not confirmed")]
    Declined,
}

impl WorkflowError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Busy => Some(ErrorCode::Busy),
            Self::Declined => None,
        }
    }
}
