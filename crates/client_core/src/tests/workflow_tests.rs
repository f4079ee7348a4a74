use std::time::Duration;

use async_trait::async_trait;
use shared::domain::{OperationOutcome, Photo, PhotoId};
use storage::MemorySlots;
use tokio::sync::Notify;

use super::*;
use crate::share::{ClipboardSink, MemoryClipboard};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    List,
    Create(String, usize),
    Remove(String),
    PublishTarget,
}

#[derive(Default)]
struct FakeStore {
    photos: Mutex<Vec<String>>,
    calls: Mutex<Vec<Call>>,
    pages_url: Option<String>,
    fail_remove: bool,
    fail_list: Mutex<bool>,
    publish_gate: Option<Arc<Notify>>,
}

impl FakeStore {
    fn with_photos(names: &[&str]) -> Self {
        Self {
            photos: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

fn photo_for(name: &str, position: usize) -> Photo {
    Photo {
        id: PhotoId::new(name),
        url: format!("https://raw.example.com/images/{name}"),
        position,
    }
}

#[async_trait]
impl PhotoStore for FakeStore {
    async fn list(&self) -> Result<Vec<Photo>, StoreError> {
        self.calls.lock().await.push(Call::List);
        if *self.fail_list.lock().await {
            return Err(StoreError::Parse("listing unavailable".into()));
        }
        Ok(self
            .photos
            .lock()
            .await
            .iter()
            .enumerate()
            .map(|(i, name)| photo_for(name, i))
            .collect())
    }

    async fn create(&self, bytes: Vec<u8>, original_name: &str) -> Result<Photo, StoreError> {
        check_upload_size(bytes.len() as u64)?;
        self.calls
            .lock()
            .await
            .push(Call::Create(original_name.to_string(), bytes.len()));
        let name = format!("1700000000000_{original_name}");
        self.photos.lock().await.push(name.clone());
        Ok(photo_for(&name, 0))
    }

    async fn remove(&self, id: &PhotoId) -> Result<(), StoreError> {
        if self.fail_remove {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.calls.lock().await.push(Call::Remove(id.to_string()));
        self.photos.lock().await.retain(|name| name != id.as_str());
        Ok(())
    }

    async fn publish_target(&self) -> Result<PublishState, StoreError> {
        self.calls.lock().await.push(Call::PublishTarget);
        if let Some(gate) = &self.publish_gate {
            gate.notified().await;
        }
        match &self.pages_url {
            Some(url) => Ok(PublishState::published(url.clone())),
            None => Err(StoreError::NotConfigured),
        }
    }
}

struct Harness {
    engine: WorkflowEngine,
    store: Arc<FakeStore>,
    slots: Arc<MemorySlots>,
    clipboard: MemoryClipboard,
}

fn harness_with(store: FakeStore, slots: MemorySlots) -> Harness {
    let store = Arc::new(store);
    let slots = Arc::new(slots);
    let clipboard = MemoryClipboard::new();
    let engine = WorkflowEngine::new(
        store.clone(),
        slots.clone(),
        Arc::new(ClipboardSink::new(clipboard.clone())),
        EngineConfig {
            status_hide_after: Duration::from_millis(20),
            location: Some(Url::parse("https://alice.github.io/album/").expect("url")),
        },
    );
    Harness {
        engine,
        store,
        slots,
        clipboard,
    }
}

fn harness(store: FakeStore) -> Harness {
    harness_with(store, MemorySlots::new())
}

fn yes(_: &str) -> bool {
    true
}

fn no(_: &str) -> bool {
    false
}

#[tokio::test]
async fn upload_reads_transmits_and_refreshes() {
    let h = harness(FakeStore::with_photos(&["a.png"]));
    h.engine.reload().await.expect("initial load");

    let report = h
        .engine
        .upload(UploadSource::from_bytes("beach.jpg", vec![7u8; 200_000]))
        .await
        .expect("not busy");

    assert!(report.succeeded(), "{report:?}");
    assert_eq!(report.status.message, "Upload succeeded!");
    assert_eq!(report.status.progress_percent, 100);
    assert_eq!(
        h.store.calls().await,
        vec![
            Call::List,
            Call::Create("beach.jpg".into(), 200_000),
            Call::List
        ]
    );
    assert_eq!(h.engine.gallery().await.len(), 2);
}

#[tokio::test]
async fn oversize_upload_fails_before_reading() {
    let h = harness(FakeStore::default());
    let too_big = UploadSource::new(
        "huge.png",
        crate::store::MAX_UPLOAD_BYTES + 1,
        tokio::io::empty(),
    );

    let report = h.engine.upload(too_big).await.expect("not busy");
    assert_eq!(report.failure_code(), Some(ErrorCode::SizeExceeded));
    assert_eq!(report.status.message, "Upload failed: file must not exceed 5 MB");
    assert_eq!(report.status.outcome, OperationOutcome::Failure);
    assert_eq!(report.status.progress_percent, 100);
    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn reader_longer_than_declared_size_is_cut_off_at_the_ceiling() {
    let h = harness(FakeStore::default());
    let endless = UploadSource::new("x.png", 1, tokio::io::repeat(0));

    let report = tokio::time::timeout(Duration::from_secs(10), h.engine.upload(endless))
        .await
        .expect("upload terminates")
        .expect("not busy");

    assert_eq!(report.failure_code(), Some(ErrorCode::SizeExceeded));
    assert_eq!(report.status.message, "Upload failed: file must not exceed 5 MB");
    assert_eq!(report.status.outcome, OperationOutcome::Failure);
    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn exactly_five_mib_upload_is_accepted() {
    let h = harness(FakeStore::default());
    let bytes = vec![0u8; crate::store::MAX_UPLOAD_BYTES as usize];
    let report = h
        .engine
        .upload(UploadSource::from_bytes("max.png", bytes))
        .await
        .expect("not busy");
    assert!(report.succeeded(), "{report:?}");
}

#[tokio::test]
async fn upload_whose_refresh_fails_reports_failure() {
    let h = harness(FakeStore::default());
    *h.store.fail_list.lock().await = true;

    let report = h
        .engine
        .upload(UploadSource::from_bytes("a.png", vec![1, 2, 3]))
        .await
        .expect("not busy");
    assert!(!report.succeeded());
    assert_eq!(report.status.message, "Upload failed: please retry");
}

#[tokio::test]
async fn upload_read_progress_never_exceeds_half() {
    let h = harness(FakeStore::default());
    let mut rx = h.engine.subscribe_status();
    let seen = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let status = rx.borrow().clone();
            let done = status.is_terminal();
            seen.push(status);
            if done {
                break;
            }
        }
        seen
    });

    h.engine
        .upload(UploadSource::from_bytes("a.png", vec![0u8; 300_000]))
        .await
        .expect("not busy");
    let seen = tokio::time::timeout(Duration::from_secs(2), seen)
        .await
        .expect("watcher finished")
        .expect("join");

    for status in seen.iter().filter(|s| s.message == "Reading file...") {
        assert!(status.progress_percent <= 50);
    }
    let percents: Vec<u8> = seen.iter().map(|s| s.progress_percent).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(seen.last().map(|s| s.outcome), Some(OperationOutcome::Success));
}

#[tokio::test]
async fn declined_delete_does_nothing() {
    let h = harness(FakeStore::with_photos(&["a.png"]));
    h.engine.reload().await.expect("load");

    let err = h.engine.delete(0, &no).await.expect_err("declined");
    assert_eq!(err, WorkflowError::Declined);
    assert_eq!(h.store.calls().await, vec![Call::List]);
    assert!(!h.engine.status().visible);
}

#[tokio::test]
async fn delete_removes_photo_and_clamps_position() {
    let h = harness(FakeStore::with_photos(&["a.png", "b.png", "c.png"]));
    h.engine.reload().await.expect("load");
    {
        let mut gallery = h.engine.gallery().await;
        gallery.next();
        gallery.next();
    }

    let report = h.engine.delete(2, &yes).await.expect("not busy");
    assert!(report.succeeded());
    assert_eq!(report.status.message, "Delete succeeded!");
    assert!(h.store.calls().await.contains(&Call::Remove("c.png".into())));

    let gallery = h.engine.gallery().await;
    assert_eq!(gallery.len(), 2);
    assert_eq!(gallery.position_label(), "2 / 2");
}

#[tokio::test]
async fn delete_failure_shows_generic_message() {
    let h = harness(FakeStore {
        fail_remove: true,
        ..FakeStore::with_photos(&["a.png"])
    });
    h.engine.reload().await.expect("load");

    let report = h.engine.delete(0, &yes).await.expect("not busy");
    assert_eq!(report.status.message, "Delete failed, please retry");
    assert_eq!(report.failure_code(), Some(ErrorCode::NotFound));
    assert_eq!(h.engine.gallery().await.len(), 1);
}

#[tokio::test]
async fn delete_out_of_range_fails_without_remote_call() {
    let h = harness(FakeStore::default());
    let report = h.engine.delete(4, &yes).await.expect("not busy");
    assert!(!report.succeeded());
    assert!(h.store.calls().await.is_empty());
}

#[tokio::test]
async fn publish_persists_address_durably() {
    let h = harness(FakeStore {
        pages_url: Some("https://alice.github.io/album/".into()),
        ..FakeStore::default()
    });

    let report = h.engine.publish().await.expect("not busy");
    assert!(report.succeeded());
    assert_eq!(report.status.message, "Publish succeeded!");
    assert_eq!(
        h.engine.publish_state().await,
        PublishState::published("https://alice.github.io/album/")
    );
    assert_eq!(
        h.slots
            .read_slot(PUBLISHED_URL_SLOT)
            .await
            .expect("read")
            .as_deref(),
        Some("https://alice.github.io/album/")
    );
}

#[tokio::test]
async fn publish_without_pages_reports_fixed_hint() {
    let h = harness(FakeStore::default());
    let report = h.engine.publish().await.expect("not busy");
    assert_eq!(report.failure_code(), Some(ErrorCode::NotConfigured));
    assert_eq!(
        report.status.message,
        "Publish failed, make sure publishing (Pages) is enabled on the store"
    );
    assert!(!h.engine.publish_state().await.is_published);
    assert!(h
        .slots
        .read_slot(PUBLISHED_URL_SLOT)
        .await
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn share_without_publish_is_a_precondition_failure() {
    let h = harness(FakeStore::with_photos(&["a.png"]));
    let report = h.engine.share().await.expect("not busy");

    assert_eq!(report.failure_code(), Some(ErrorCode::PreconditionFailed));
    assert_eq!(report.status.message, "Please publish the album first");
    assert_eq!(h.engine.publish_state().await, PublishState::default());
    assert!(h.clipboard.contents().is_none());
}

#[tokio::test]
async fn share_after_publish_copies_view_address() {
    let h = harness(FakeStore {
        pages_url: Some("https://alice.github.io/album/".into()),
        ..FakeStore::with_photos(&["a.png"])
    });
    h.engine.publish().await.expect("publish");

    let report = h.engine.share().await.expect("not busy");
    assert!(report.succeeded());
    assert_eq!(
        report.status.message,
        "Link copied, paste it into your group chat"
    );
    assert_eq!(
        h.clipboard.contents().as_deref(),
        Some("https://alice.github.io/album/?mode=view")
    );
}

#[tokio::test]
async fn share_uses_durable_slot_from_an_earlier_session() {
    let h = harness_with(
        FakeStore::default(),
        MemorySlots::with_slot(PUBLISHED_URL_SLOT, "https://bob.github.io/pics/?lang=en"),
    );

    let report = h.engine.share().await.expect("not busy");
    assert!(report.succeeded(), "{report:?}");
    assert_eq!(
        h.clipboard.contents().as_deref(),
        Some("https://bob.github.io/pics/?lang=en&mode=view")
    );
    assert!(!h.engine.publish_state().await.is_published);
}

struct CapturingSink {
    payloads: std::sync::Mutex<Vec<SharePayload>>,
}

#[async_trait]
impl ShareSink for CapturingSink {
    fn name(&self) -> &'static str {
        "capturing"
    }

    async fn deliver(&self, payload: &SharePayload) -> Result<ShareReceipt, crate::error::ShareError> {
        self.payloads.lock().expect("lock").push(payload.clone());
        Ok(ShareReceipt::Delivered)
    }
}

struct RefusingHost;

#[async_trait]
impl crate::share::ShareHost for RefusingHost {
    async fn share(
        &self,
        _message: &shared::protocol::HostShareMessage,
    ) -> Result<(), crate::error::ShareError> {
        Err(crate::error::ShareError::HostRejected(503))
    }
}

#[tokio::test]
async fn host_refusal_ends_share_with_generic_failure() {
    let engine = WorkflowEngine::new(
        Arc::new(FakeStore::default()),
        Arc::new(MemorySlots::with_slot(
            PUBLISHED_URL_SLOT,
            "https://alice.github.io/album/",
        )),
        Arc::new(crate::share::NativeHostSink::new(RefusingHost)),
        EngineConfig::default(),
    );

    let report = engine.share().await.expect("not busy");
    assert_eq!(report.status.message, "Share failed");
    assert_eq!(report.status.progress_percent, 100);
    assert_eq!(report.status.outcome, OperationOutcome::Failure);
    assert_eq!(report.failure_code(), Some(ErrorCode::NetworkError));
    assert_eq!(engine.status(), report.status);
}

#[tokio::test]
async fn share_payload_previews_first_photo_or_nothing() {
    let sink = Arc::new(CapturingSink {
        payloads: std::sync::Mutex::new(Vec::new()),
    });
    let store = Arc::new(FakeStore::default());
    let engine = WorkflowEngine::new(
        store.clone(),
        Arc::new(MemorySlots::with_slot(
            PUBLISHED_URL_SLOT,
            "https://alice.github.io/album/",
        )),
        sink.clone(),
        EngineConfig::default(),
    );

    let report = engine.share().await.expect("not busy");
    assert_eq!(report.status.message, "Share succeeded!");

    store.photos.lock().await.extend(["first.png".to_string(), "second.png".to_string()]);
    engine.reload().await.expect("load");
    engine.share().await.expect("not busy");

    let payloads = sink.payloads.lock().expect("lock");
    assert_eq!(payloads[0].preview_image, "");
    assert_eq!(payloads[0].title, SHARE_TITLE);
    assert_eq!(payloads[0].url, "https://alice.github.io/album/?mode=view");
    assert_eq!(
        payloads[1].preview_image,
        "https://raw.example.com/images/first.png"
    );
}

#[tokio::test]
async fn second_workflow_is_rejected_while_first_runs() {
    let gate = Arc::new(Notify::new());
    let h = harness(FakeStore {
        pages_url: Some("https://alice.github.io/album/".into()),
        publish_gate: Some(gate.clone()),
        ..FakeStore::default()
    });

    let (first, second) = tokio::join!(h.engine.publish(), async {
        tokio::task::yield_now().await;
        let second = h.engine.share().await;
        // Status still belongs to the publish workflow.
        assert_eq!(h.engine.status().message, "Publishing album...");
        gate.notify_one();
        second
    });

    assert!(first.expect("first runs").succeeded());
    assert_eq!(second.expect_err("busy"), WorkflowError::Busy);
}

#[tokio::test]
async fn terminal_status_auto_hides() {
    let h = harness(FakeStore::default());
    let mut rx = h.engine.subscribe_status();
    h.engine.publish().await.expect("not busy");
    assert!(h.engine.status().is_terminal());

    tokio::time::timeout(Duration::from_secs(2), async {
        while rx.borrow_and_update().visible {
            rx.changed().await.expect("sender alive");
        }
    })
    .await
    .expect("hidden");
    assert_eq!(h.engine.status().progress_percent, 0);
}

#[test]
fn share_link_marks_location_as_view_mode() {
    let engine = harness(FakeStore::default()).engine;
    assert_eq!(
        engine.share_link().map(|url| url.to_string()).as_deref(),
        Some("https://alice.github.io/album/?mode=view")
    );
}
