//! Share sinks: hand a share payload to an external host, or fall back to the clipboard.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{HostShareMessage, SharePayload};
use tracing::info;
use url::Url;

use crate::error::ShareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareReceipt {
    /// The external host accepted the message.
    Delivered,
    /// The address was copied; the user pastes it manually.
    Copied,
}

#[async_trait]
pub trait ShareSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, payload: &SharePayload) -> Result<ShareReceipt, ShareError>;
}

#[async_trait]
pub trait ShareHost: Send + Sync {
    async fn share(&self, message: &HostShareMessage) -> Result<(), ShareError>;
}

pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ShareError>;
}

pub struct NativeHostSink<H> {
    host: H,
}

impl<H: ShareHost> NativeHostSink<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }
}

#[async_trait]
impl<H: ShareHost> ShareSink for NativeHostSink<H> {
    fn name(&self) -> &'static str {
        "native-host"
    }

    async fn deliver(&self, payload: &SharePayload) -> Result<ShareReceipt, ShareError> {
        self.host.share(&HostShareMessage::from(payload)).await?;
        Ok(ShareReceipt::Delivered)
    }
}

pub struct ClipboardSink<C> {
    clipboard: C,
}

impl<C: ClipboardWriter> ClipboardSink<C> {
    pub fn new(clipboard: C) -> Self {
        Self { clipboard }
    }
}

#[async_trait]
impl<C: ClipboardWriter> ShareSink for ClipboardSink<C> {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    async fn deliver(&self, payload: &SharePayload) -> Result<ShareReceipt, ShareError> {
        self.clipboard.write_text(&payload.url)?;
        Ok(ShareReceipt::Copied)
    }
}

/// Chat-robot style webhook acting as the external share host.
pub struct WebhookShareHost {
    http: Client,
    webhook: Url,
}

impl WebhookShareHost {
    pub fn new(http: Client, webhook: Url) -> Self {
        Self { http, webhook }
    }
}

#[async_trait]
impl ShareHost for WebhookShareHost {
    async fn share(&self, message: &HostShareMessage) -> Result<(), ShareError> {
        let response = self
            .http
            .post(self.webhook.clone())
            .json(message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ShareError::HostRejected(response.status().as_u16()));
        }
        info!(url = %message.url, "share: host accepted message");
        Ok(())
    }
}

/// Clipboard kept in process memory, for headless sessions.
#[derive(Default, Clone)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }
}

impl ClipboardWriter for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), ShareError> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| ShareError::Clipboard("clipboard lock poisoned".into()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

/// Picks the sink once at startup: a configured webhook means a share host is available.
pub fn select_share_sink<C>(webhook: Option<Url>, clipboard: C) -> Arc<dyn ShareSink>
where
    C: ClipboardWriter + 'static,
{
    match webhook {
        Some(webhook) => {
            info!(webhook = %webhook, "share: using webhook host");
            Arc::new(NativeHostSink::new(WebhookShareHost::new(
                Client::new(),
                webhook,
            )))
        }
        None => {
            info!("share: no host detected; falling back to clipboard");
            Arc::new(ClipboardSink::new(clipboard))
        }
    }
}
