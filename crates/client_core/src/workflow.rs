//! Multi-stage gallery workflows: upload, delete, publish and share.
//!
//! Every workflow runs its stages strictly in order, publishes progress to the
//! [`StatusReporter`], and ends in exactly one terminal status. Only one
//! workflow may run at a time; a second start is rejected with
//! [`WorkflowError::Busy`] instead of interleaving status updates.

use std::{
    fmt,
    future::Future,
    io::Cursor,
    path::Path,
    sync::Arc,
};

use shared::{
    domain::{OperationStatus, PublishState},
    error::{ErrorCode, Failure},
    protocol::SharePayload,
};
use storage::{SlotStore, PUBLISHED_URL_SLOT};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::{watch, Mutex, MutexGuard, RwLock},
};
use tracing::{info, warn};
use url::Url;

use crate::{
    config::EngineConfig,
    error::{StageError, StoreError, WorkflowError},
    gallery::GalleryState,
    mode::with_view_mode,
    share::{ShareReceipt, ShareSink},
    status::StatusReporter,
    store::{check_upload_size, PhotoStore, MAX_UPLOAD_BYTES},
};

const READ_CHUNK_BYTES: usize = 64 * 1024;
const READ_STAGE_WEIGHT: u64 = 50;

pub const SHARE_TITLE: &str = "Photo album";
pub const SHARE_DESCRIPTION: &str = "View my photo album";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    Upload,
    Delete,
    Publish,
    Share,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upload => "upload",
            Self::Delete => "delete",
            Self::Publish => "publish",
            Self::Share => "share",
        })
    }
}

impl WorkflowKind {
    fn failure_message(self, err: &StageError) -> &'static str {
        match (self, err) {
            (Self::Upload, StageError::Store(StoreError::SizeExceeded { .. })) => {
                "Upload failed: file must not exceed 5 MB"
            }
            (Self::Upload, _) => "Upload failed: please retry",
            (Self::Delete, _) => "Delete failed, please retry",
            (Self::Publish, _) => {
                "Publish failed, make sure publishing (Pages) is enabled on the store"
            }
            (Self::Share, StageError::NotPublished) => "Please publish the album first",
            (Self::Share, _) => "Share failed",
        }
    }
}

/// Outcome of a workflow that ran to its terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReport {
    pub workflow: WorkflowKind,
    pub status: OperationStatus,
    pub failure: Option<Failure>,
}

impl WorkflowReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failure_code(&self) -> Option<ErrorCode> {
        self.failure.as_ref().map(|failure| failure.code)
    }
}

/// Yes/no prompt gating destructive actions.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool + Send + Sync> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct UploadSource {
    name: String,
    size: u64,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl UploadSource {
    pub fn new(
        name: impl Into<String>,
        size: u64,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self::new(name, size, Cursor::new(bytes))
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        Ok(Self::new(name, size, file))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads at most one byte past the upload ceiling, so a reader that
    /// outruns its declared size still ends and can be rejected.
    async fn read_all(&mut self, mut on_progress: impl FnMut(u64, u64)) -> std::io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.size as usize);
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        let mut limited = (&mut self.reader).take(MAX_UPLOAD_BYTES + 1);
        loop {
            let read = limited.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            on_progress(buffer.len() as u64, self.size);
        }
        Ok(buffer)
    }
}

pub struct WorkflowEngine {
    store: Arc<dyn PhotoStore>,
    slots: Arc<dyn SlotStore>,
    share_sink: Arc<dyn ShareSink>,
    config: EngineConfig,
    gallery: Mutex<GalleryState>,
    publish_state: RwLock<PublishState>,
    status: StatusReporter,
    active: Mutex<()>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn PhotoStore>,
        slots: Arc<dyn SlotStore>,
        share_sink: Arc<dyn ShareSink>,
        config: EngineConfig,
    ) -> Self {
        let status = StatusReporter::new(config.status_hide_after);
        Self {
            store,
            slots,
            share_sink,
            config,
            gallery: Mutex::new(GalleryState::new()),
            publish_state: RwLock::new(PublishState::default()),
            status,
            active: Mutex::new(()),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<OperationStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> OperationStatus {
        self.status.current()
    }

    pub async fn gallery(&self) -> MutexGuard<'_, GalleryState> {
        self.gallery.lock().await
    }

    pub async fn publish_state(&self) -> PublishState {
        self.publish_state.read().await.clone()
    }

    /// Loads the gallery outside any workflow; failures are only logged by callers.
    pub async fn reload(&self) -> Result<(), StoreError> {
        let photos = self.store.list().await?;
        self.gallery.lock().await.replace(photos);
        Ok(())
    }

    /// View-mode address of the gallery's own location, if one is configured.
    pub fn share_link(&self) -> Option<Url> {
        self.config.location.as_ref().map(with_view_mode)
    }

    pub async fn upload(&self, source: UploadSource) -> Result<WorkflowReport, WorkflowError> {
        self.run(
            WorkflowKind::Upload,
            "Preparing upload...",
            0,
            self.upload_stages(source),
        )
        .await
    }

    pub async fn delete(
        &self,
        position: usize,
        confirm: &dyn Confirm,
    ) -> Result<WorkflowReport, WorkflowError> {
        if !confirm.confirm("Delete this photo?") {
            info!(position, "workflow: delete declined");
            return Err(WorkflowError::Declined);
        }
        self.run(
            WorkflowKind::Delete,
            "Deleting...",
            50,
            self.delete_stages(position),
        )
        .await
    }

    pub async fn publish(&self) -> Result<WorkflowReport, WorkflowError> {
        self.run(
            WorkflowKind::Publish,
            "Publishing album...",
            30,
            self.publish_stages(),
        )
        .await
    }

    pub async fn share(&self) -> Result<WorkflowReport, WorkflowError> {
        self.run(WorkflowKind::Share, "Sharing...", 0, self.share_stages())
            .await
    }

    async fn run(
        &self,
        workflow: WorkflowKind,
        opening: &str,
        opening_percent: u8,
        stages: impl Future<Output = Result<&'static str, StageError>>,
    ) -> Result<WorkflowReport, WorkflowError> {
        let Ok(_active) = self.active.try_lock() else {
            warn!(%workflow, "workflow: rejected while another workflow is running");
            return Err(WorkflowError::Busy);
        };

        info!(%workflow, "workflow: started");
        self.status.begin(opening, opening_percent);

        let (status, failure) = match stages.await {
            Ok(message) => {
                info!(%workflow, "workflow: succeeded");
                (OperationStatus::success(message), None)
            }
            Err(err) => {
                warn!(%workflow, error = %err, "workflow: failed");
                let message = workflow.failure_message(&err);
                (
                    OperationStatus::failure(message),
                    Some(Failure::new(err.code(), message)),
                )
            }
        };

        self.status.finish(status.clone());
        Ok(WorkflowReport {
            workflow,
            status,
            failure,
        })
    }

    async fn refresh(&self) -> Result<(), StageError> {
        self.reload().await?;
        Ok(())
    }

    async fn upload_stages(&self, mut source: UploadSource) -> Result<&'static str, StageError> {
        check_upload_size(source.size())?;

        self.status.progress("Reading file...", 0);
        let bytes = source
            .read_all(|loaded, total| {
                if total > 0 {
                    let percent = (loaded.min(total) * READ_STAGE_WEIGHT / total) as u8;
                    self.status.progress("Reading file...", percent);
                }
            })
            .await?;
        check_upload_size(bytes.len() as u64)?;

        self.status
            .progress("Uploading to the store...", READ_STAGE_WEIGHT as u8);
        let photo = self.store.create(bytes, source.name()).await?;
        self.status.progress("Uploading to the store...", 90);

        self.refresh().await?;
        info!(photo = %photo.id, "workflow: upload stored and gallery refreshed");
        Ok("Upload succeeded!")
    }

    async fn delete_stages(&self, position: usize) -> Result<&'static str, StageError> {
        let photo = self
            .gallery
            .lock()
            .await
            .photo_at(position)
            .cloned()
            .ok_or(StageError::NoSuchPhoto(position))?;

        self.store.remove(&photo.id).await?;
        self.status.progress("Deleting...", 90);

        self.refresh().await?;
        Ok("Delete succeeded!")
    }

    async fn publish_stages(&self) -> Result<&'static str, StageError> {
        let target = self.store.publish_target().await?;
        if let Some(url) = target.published_url.as_deref() {
            self.slots
                .write_slot(PUBLISHED_URL_SLOT, url)
                .await
                .map_err(|err| StageError::Slot(format!("{err:#}")))?;
        }
        info!(url = ?target.published_url, "workflow: album published");
        *self.publish_state.write().await = target;
        Ok("Publish succeeded!")
    }

    async fn share_stages(&self) -> Result<&'static str, StageError> {
        let published_url = self.resolve_published_url().await?;
        let view_url = Url::parse(&published_url)
            .map(|url| with_view_mode(&url))
            .map_err(|_| StageError::InvalidAddress(published_url.clone()))?;

        let preview_image = self
            .gallery
            .lock()
            .await
            .first_photo()
            .map(|photo| photo.url.clone())
            .unwrap_or_default();
        let payload = SharePayload {
            title: SHARE_TITLE.to_string(),
            description: SHARE_DESCRIPTION.to_string(),
            url: view_url.to_string(),
            preview_image,
        };

        self.status.progress("Sharing...", 50);
        let receipt = self.share_sink.deliver(&payload).await?;
        info!(sink = self.share_sink.name(), url = %payload.url, "workflow: album shared");
        Ok(match receipt {
            ShareReceipt::Delivered => "Share succeeded!",
            ShareReceipt::Copied => "Link copied, paste it into your group chat",
        })
    }

    /// In-memory state wins; the durable slot covers earlier sessions.
    async fn resolve_published_url(&self) -> Result<String, StageError> {
        {
            let state = self.publish_state.read().await;
            if state.is_published {
                if let Some(url) = state.published_url.clone() {
                    return Ok(url);
                }
            }
        }

        self.slots
            .read_slot(PUBLISHED_URL_SLOT)
            .await
            .map_err(|err| StageError::Slot(format!("{err:#}")))?
            .filter(|url| !url.trim().is_empty())
            .ok_or(StageError::NotPublished)
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
