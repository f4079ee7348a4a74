use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

// Remote filename; doubles as the photo's identity.
name_newtype!(PhotoId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub url: String,
    /// Zero-based index in the sequence at the last reload.
    pub position: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishState {
    pub is_published: bool,
    pub published_url: Option<String>,
}

impl PublishState {
    pub fn published(url: impl Into<String>) -> Self {
        Self {
            is_published: true,
            published_url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Viewer,
    #[default]
    Editor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    #[default]
    InProgress,
    Success,
    Failure,
}

/// Snapshot of the progress indicator shown while a workflow runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub visible: bool,
    pub message: String,
    pub progress_percent: u8,
    pub outcome: OperationOutcome,
}

impl OperationStatus {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn in_progress(message: impl Into<String>, progress_percent: u8) -> Self {
        Self {
            visible: true,
            message: message.into(),
            progress_percent: progress_percent.min(100),
            outcome: OperationOutcome::InProgress,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            visible: true,
            message: message.into(),
            progress_percent: 100,
            outcome: OperationOutcome::Success,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            visible: true,
            message: message.into(),
            progress_percent: 100,
            outcome: OperationOutcome::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.visible && self.outcome != OperationOutcome::InProgress
    }
}
