use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    SizeExceeded,
    RemoteRejected,
    NetworkError,
    NotFound,
    NotConfigured,
    PreconditionFailed,
    Busy,
}

/// User-facing failure: a fixed message, never backend detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub code: ErrorCode,
    pub message: String,
}

impl Failure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct FailureException {
    pub code: ErrorCode,
    pub message: String,
}

impl FailureException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<FailureException> for Failure {
    fn from(value: FailureException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
