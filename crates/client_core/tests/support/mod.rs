//! In-process stand-in for the GitHub contents and pages endpoints.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use client_core::StoreConfig;
use serde_json::{json, Value};
use shared::protocol::{DeleteContentRequest, PutContentRequest};
use tokio::{net::TcpListener, sync::Mutex};
use url::Url;

pub const TOKEN: &str = "ghp_test_token";

#[derive(Debug, Clone)]
pub struct MockFile {
    pub name: String,
    pub sha: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
pub struct MockGithub {
    pub files: Arc<Mutex<Vec<MockFile>>>,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub pages_url: Arc<Mutex<Option<String>>>,
    pub listing_override: Arc<Mutex<Option<Value>>>,
    pub fail_metadata: Arc<Mutex<bool>>,
    pub reject_put: Arc<Mutex<bool>>,
    base_url: Arc<Mutex<String>>,
}

impl MockGithub {
    pub async fn add_file(&self, name: &str) {
        let mut files = self.files.lock().await;
        let sha = format!("sha-{}-{}", files.len(), name);
        files.push(MockFile {
            name: name.to_string(),
            sha,
            size: 0,
        });
    }

    pub async fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    async fn record(&self, method: Method, path: String, headers: &HeaderMap, body: Option<Value>) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().await.push(RecordedRequest {
            method,
            path,
            authorization,
            body,
        });
    }

    async fn download_url(&self, name: &str) -> String {
        format!("{}/raw/images/{name}", self.base_url.lock().await)
    }
}

async fn get_contents(
    State(mock): State<MockGithub>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let path = path.trim_start_matches('/').to_string();
    mock.record(Method::GET, path.clone(), &headers, None).await;

    if path == "images" {
        if let Some(listing) = mock.listing_override.lock().await.clone() {
            return (StatusCode::OK, Json(listing)).into_response();
        }
        let files = mock.files.lock().await.clone();
        if files.is_empty() {
            return (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response();
        }
        let mut entries = Vec::new();
        for file in files {
            entries.push(json!({
                "name": file.name,
                "path": format!("images/{}", file.name),
                "sha": file.sha,
                "type": "file",
                "download_url": mock.download_url(&file.name).await,
            }));
        }
        return (StatusCode::OK, Json(Value::Array(entries))).into_response();
    }

    if *mock.fail_metadata.lock().await {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"}))).into_response();
    }

    let name = path.trim_start_matches("images/");
    let file = mock
        .files
        .lock()
        .await
        .iter()
        .find(|f| f.name == name)
        .cloned();
    match file {
        Some(file) => (
            StatusCode::OK,
            Json(json!({
                "name": file.name,
                "path": path,
                "sha": file.sha,
                "type": "file",
            })),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
    }
}

async fn put_contents(
    State(mock): State<MockGithub>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<PutContentRequest>,
) -> Response {
    let path = path.trim_start_matches('/').to_string();
    let recorded = json!({ "message": body.message, "branch": body.branch });
    mock.record(Method::PUT, path.clone(), &headers, Some(recorded))
        .await;

    if *mock.reject_put.lock().await {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": "sha wasn't supplied"})))
            .into_response();
    }

    let Ok(bytes) = STANDARD.decode(body.content.as_bytes()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "bad base64"}))).into_response();
    };
    let name = path.trim_start_matches("images/").to_string();
    let sha = format!("sha-new-{name}");
    mock.files.lock().await.push(MockFile {
        name: name.clone(),
        sha: sha.clone(),
        size: bytes.len(),
    });
    let download_url = mock.download_url(&name).await;
    (
        StatusCode::CREATED,
        Json(json!({
            "content": {
                "name": name,
                "path": path,
                "sha": sha,
                "download_url": download_url,
            }
        })),
    )
        .into_response()
}

async fn delete_contents(
    State(mock): State<MockGithub>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<DeleteContentRequest>,
) -> Response {
    let path = path.trim_start_matches('/').to_string();
    let recorded = json!({ "message": body.message, "sha": body.sha, "branch": body.branch });
    mock.record(Method::DELETE, path.clone(), &headers, Some(recorded))
        .await;

    let name = path.trim_start_matches("images/");
    let mut files = mock.files.lock().await;
    let Some(index) = files.iter().position(|f| f.name == name && f.sha == body.sha) else {
        return (StatusCode::CONFLICT, Json(json!({"message": "sha mismatch"}))).into_response();
    };
    files.remove(index);
    (StatusCode::OK, Json(json!({"commit": {}}))).into_response()
}

async fn get_pages(
    State(mock): State<MockGithub>,
    Path((_owner, _repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    mock.record(Method::GET, "pages".to_string(), &headers, None)
        .await;
    match mock.pages_url.lock().await.clone() {
        Some(url) => (StatusCode::OK, Json(json!({ "html_url": url }))).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
    }
}

pub async fn spawn_mock_github() -> anyhow::Result<(StoreConfig, MockGithub)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let mock = MockGithub::default();
    *mock.base_url.lock().await = format!("http://{addr}");

    let app = Router::new()
        .route(
            "/repos/:owner/:repo/contents/*path",
            get(get_contents).put(put_contents).delete(delete_contents),
        )
        .route("/repos/:owner/:repo/pages", get(get_pages))
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .with_state(mock.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let config = StoreConfig {
        api_base: Url::parse(&format!("http://{addr}"))?,
        owner: "alice".to_string(),
        repo: "photo-album".to_string(),
        branch: "main".to_string(),
        token: TOKEN.to_string(),
        images_dir: "images".to_string(),
        user_agent: "photo-gallery-tests".to_string(),
        request_timeout: Duration::from_secs(10),
    };
    Ok((config, mock))
}
