//! Wire types for the GitHub contents and pages endpoints plus the share payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentRequest {
    pub message: String,
    pub content: String,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContentResponse {
    #[serde(default)]
    pub content: Option<ContentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteContentRequest {
    pub message: String,
    pub sha: String,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesInfo {
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub title: String,
    pub description: String,
    pub url: String,
    /// First photo's address, or empty when the gallery has no photos.
    pub preview_image: String,
}

/// Message shape accepted by an external share host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostShareMessage {
    #[serde(rename = "type")]
    pub kind: u8,
    pub title: String,
    pub content: String,
    pub url: String,
    pub pic: String,
}

impl From<&SharePayload> for HostShareMessage {
    fn from(payload: &SharePayload) -> Self {
        Self {
            kind: 0,
            title: payload.title.clone(),
            content: payload.description.clone(),
            url: payload.url.clone(),
            pic: payload.preview_image.clone(),
        }
    }
}
