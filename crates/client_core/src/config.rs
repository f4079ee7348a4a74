use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_CONFIG_FILE: &str = "gallery.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting '{0}'")]
    MissingField(&'static str),
    #[error("setting '{field}' is not a valid url: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
}

/// Everything the remote store client needs. The token lives here and nowhere else.
#[derive(Clone)]
pub struct StoreConfig {
    pub api_base: Url,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: String,
    pub images_dir: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("api_base", &self.api_base.as_str())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &"<redacted>")
            .field("images_dir", &self.images_dir)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a terminal status stays visible before it is hidden.
    pub status_hide_after: Duration,
    /// Address the gallery itself is served from, used for plain share links.
    pub location: Option<Url>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status_hide_after: Duration::from_millis(3000),
            location: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub token: String,
    pub api_base: String,
    pub images_dir: String,
    pub database_url: String,
    pub share_webhook: Option<String>,
    pub location: Option<String>,
    pub status_hide_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: "photo-album".into(),
            branch: "main".into(),
            token: String::new(),
            api_base: DEFAULT_API_BASE.into(),
            images_dir: "images".into(),
            database_url: "sqlite://./data/gallery.db".into(),
            share_webhook: None,
            location: None,
            status_hide_ms: 3000,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    owner: Option<String>,
    repo: Option<String>,
    branch: Option<String>,
    token: Option<String>,
    api_base: Option<String>,
    images_dir: Option<String>,
    database_url: Option<String>,
    share_webhook: Option<String>,
    location: Option<String>,
    status_hide_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then `gallery.toml` (or `path`), then environment overrides.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        match settings.apply_file(&raw) {
            Ok(()) => tracing::debug!(path = %path.display(), "config: file settings applied"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config: ignoring unreadable settings file")
            }
        }
    }

    settings.apply_env_with(|key| std::env::var(key).ok());
    settings
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) -> Result<(), toml::de::Error> {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.owner {
            self.owner = v;
        }
        if let Some(v) = file_cfg.repo {
            self.repo = v;
        }
        if let Some(v) = file_cfg.branch {
            self.branch = v;
        }
        if let Some(v) = file_cfg.token {
            self.token = v;
        }
        if let Some(v) = file_cfg.api_base {
            self.api_base = v;
        }
        if let Some(v) = file_cfg.images_dir {
            self.images_dir = v;
        }
        if let Some(v) = file_cfg.database_url {
            self.database_url = v;
        }
        if file_cfg.share_webhook.is_some() {
            self.share_webhook = file_cfg.share_webhook;
        }
        if file_cfg.location.is_some() {
            self.location = file_cfg.location;
        }
        if let Some(v) = file_cfg.status_hide_ms {
            self.status_hide_ms = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        Ok(())
    }

    /// Applies `GALLERY_*` variables; an `APP__*` alias takes precedence when both are set.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let pick = |name: &str| {
            lookup(&format!("APP__{name}")).or_else(|| lookup(&format!("GALLERY_{name}")))
        };

        if let Some(v) = pick("OWNER") {
            self.owner = v;
        }
        if let Some(v) = pick("REPO") {
            self.repo = v;
        }
        if let Some(v) = pick("BRANCH") {
            self.branch = v;
        }
        if let Some(v) = pick("TOKEN") {
            self.token = v;
        }
        if let Some(v) = pick("API_BASE") {
            self.api_base = v;
        }
        if let Some(v) = pick("IMAGES_DIR") {
            self.images_dir = v;
        }
        if let Some(v) = pick("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = pick("SHARE_WEBHOOK") {
            self.share_webhook = Some(v);
        }
        if let Some(v) = pick("LOCATION") {
            self.location = Some(v);
        }
        if let Some(v) = pick("STATUS_HIDE_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.status_hide_ms = parsed;
            }
        }
        if let Some(v) = pick("REQUEST_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.request_timeout_secs = parsed;
            }
        }
    }

    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::MissingField("owner"));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::MissingField("repo"));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingField("token"));
        }
        let api_base = Url::parse(self.api_base.trim()).map_err(|source| ConfigError::InvalidUrl {
            field: "api_base",
            source,
        })?;

        Ok(StoreConfig {
            api_base,
            owner: self.owner.trim().to_string(),
            repo: self.repo.trim().to_string(),
            branch: self.branch.trim().to_string(),
            token: self.token.trim().to_string(),
            images_dir: self.images_dir.trim_matches('/').to_string(),
            user_agent: format!("photo-gallery/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        })
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let location = self
            .location
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
                    field: "location",
                    source,
                })
            })
            .transpose()?;
        Ok(EngineConfig {
            status_hide_after: Duration::from_millis(self.status_hide_ms),
            location,
        })
    }

    pub fn share_webhook_url(&self) -> Result<Option<Url>, ConfigError> {
        self.share_webhook
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
                    field: "share_webhook",
                    source,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
