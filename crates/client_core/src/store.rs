//! Remote store client: the GitHub contents API used as the gallery's only persistence.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use shared::{
    domain::{Photo, PhotoId, PublishState},
    protocol::{ContentEntry, DeleteContentRequest, PagesInfo, PutContentRequest, PutContentResponse},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::StoreConfig, error::StoreError};

/// Upload ceiling; anything larger is refused before touching the network.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
const PAGES_ACCEPT: &str = "application/vnd.github.v3+json";

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Photos in remote listing order. A malformed listing is an empty gallery.
    async fn list(&self) -> Result<Vec<Photo>, StoreError>;
    /// Stores a new photo. The returned position is provisional until the next listing.
    async fn create(&self, bytes: Vec<u8>, original_name: &str) -> Result<Photo, StoreError>;
    async fn remove(&self, id: &PhotoId) -> Result<(), StoreError>;
    async fn publish_target(&self) -> Result<PublishState, StoreError>;
}

pub fn is_image_name(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

pub fn check_upload_size(size: u64) -> Result<(), StoreError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(StoreError::SizeExceeded {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub struct GithubStore {
    http: Client,
    config: StoreConfig,
    last_stamp: AtomicI64,
}

impl GithubStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            last_stamp: AtomicI64::new(0),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn repo_url(&self, tail: &[&str]) -> Url {
        let mut url = self.config.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
                .extend(tail.iter().copied());
        }
        url
    }

    fn contents_url(&self, file_name: Option<&str>) -> Url {
        let mut tail = vec!["contents"];
        tail.extend(self.config.images_dir.split('/').filter(|s| !s.is_empty()));
        if let Some(name) = file_name {
            tail.push(name);
        }
        self.repo_url(&tail)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", self.config.token),
            )
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.config.owner, self.config.repo, self.config.branch, path
        )
    }

    fn remote_path(&self, name: &str) -> String {
        if self.config.images_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.config.images_dir, name)
        }
    }

    /// Millisecond stamp that never repeats or goes backwards within this client.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    fn photos_from_listing(&self, listing: Value) -> Vec<Photo> {
        let Value::Array(items) = listing else {
            debug!("store: listing is not an array; treating as empty gallery");
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ContentEntry>(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "store: skipping malformed listing entry");
                    None
                }
            })
            .filter(|entry| entry.kind.as_deref() != Some("dir") && is_image_name(&entry.name))
            .enumerate()
            .map(|(position, entry)| {
                let url = entry
                    .download_url
                    .unwrap_or_else(|| self.raw_url(&entry.path));
                Photo {
                    id: PhotoId(entry.name),
                    url,
                    position,
                }
            })
            .collect()
    }

    async fn lookup_sha(&self, id: &PhotoId) -> Result<String, StoreError> {
        let response = self
            .request(Method::GET, self.contents_url(Some(id.as_str())))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|err| {
                warn!(photo = %id, error = %err, "store: revision lookup failed");
                StoreError::NotFound(id.clone())
            })?;

        if !response.status().is_success() {
            warn!(photo = %id, status = response.status().as_u16(), "store: revision lookup rejected");
            return Err(StoreError::NotFound(id.clone()));
        }

        let entry: ContentEntry = response.json().await.map_err(|err| {
            warn!(photo = %id, error = %err, "store: revision lookup returned malformed metadata");
            StoreError::NotFound(id.clone())
        })?;
        entry.sha.ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

#[async_trait]
impl PhotoStore for GithubStore {
    async fn list(&self) -> Result<Vec<Photo>, StoreError> {
        let response = self
            .request(Method::GET, self.contents_url(None))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        // The images directory only exists after the first upload.
        if response.status() == StatusCode::NOT_FOUND {
            info!("store: images directory not found; gallery is empty");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(StoreError::RemoteRejected {
                operation: "list",
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let listing: Value =
            serde_json::from_str(&body).map_err(|err| StoreError::Parse(err.to_string()))?;
        let photos = self.photos_from_listing(listing);
        debug!(count = photos.len(), "store: listing loaded");
        Ok(photos)
    }

    async fn create(&self, bytes: Vec<u8>, original_name: &str) -> Result<Photo, StoreError> {
        check_upload_size(bytes.len() as u64)?;

        let name = format!("{}_{}", self.next_stamp(), original_name);
        let request = PutContentRequest {
            message: format!("Upload photo: {original_name}"),
            content: STANDARD.encode(&bytes),
            branch: self.config.branch.clone(),
        };
        let response = self
            .request(Method::PUT, self.contents_url(Some(&name)))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::RemoteRejected {
                operation: "create",
                status: status.as_u16(),
            });
        }

        let download_url = response
            .json::<PutContentResponse>()
            .await
            .ok()
            .and_then(|body| body.content)
            .and_then(|content| content.download_url);
        let url = download_url.unwrap_or_else(|| self.raw_url(&self.remote_path(&name)));
        info!(photo = %name, bytes = bytes.len(), "store: photo created");

        Ok(Photo {
            id: PhotoId(name),
            url,
            position: 0,
        })
    }

    async fn remove(&self, id: &PhotoId) -> Result<(), StoreError> {
        let sha = self.lookup_sha(id).await?;
        let request = DeleteContentRequest {
            message: format!("Delete photo: {id}"),
            sha,
            branch: self.config.branch.clone(),
        };
        let response = self
            .request(Method::DELETE, self.contents_url(Some(id.as_str())))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::RemoteRejected {
                operation: "delete",
                status: response.status().as_u16(),
            });
        }
        info!(photo = %id, "store: photo deleted");
        Ok(())
    }

    async fn publish_target(&self) -> Result<PublishState, StoreError> {
        let response = self
            .request(Method::GET, self.repo_url(&["pages"]))
            .header(reqwest::header::ACCEPT, PAGES_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            info!(
                status = response.status().as_u16(),
                "store: pages metadata unavailable"
            );
            return Err(StoreError::NotConfigured);
        }

        let pages: PagesInfo = response
            .json()
            .await
            .map_err(|err| StoreError::Parse(err.to_string()))?;
        Ok(PublishState::published(pages.html_url))
    }
}
