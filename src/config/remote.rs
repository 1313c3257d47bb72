//! Remote configuration service.
//!
//! The plant configuration service publishes two documents per device: the
//! scanner list (`getConfigScanner`) and the root settings (`getConfigRoot`).
//! They are merged into the same full-form document the local file uses.

use super::settings::{retention_days, AppConfig, ConfigLoad, ConfigSource};
use crate::error::{ConfigError, ConfigResult};
use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the remote configuration service.
pub struct RemoteConfigClient {
    base_url: String,
    device: String,
    http: reqwest::Client,
}

impl RemoteConfigClient {
    /// Create a client for `base_url`; the device defaults to this host's name.
    pub fn new(base_url: impl Into<String>, device: Option<String>) -> ConfigResult<Self> {
        let device = device.unwrap_or_else(|| gethostname::gethostname().to_string_lossy().into_owned());

        // Plant services commonly sit behind an internal CA.
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .user_agent(concat!("scantag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Remote(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            device,
            http,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, endpoint: &str) -> ConfigResult<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, device = %self.device, "requesting remote configuration");

        let response = self
            .http
            .get(&url)
            .query(&[("name", self.device.as_str())])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ConfigError::Remote(format!("{}: {}", endpoint, e)))?
            .error_for_status()
            .map_err(|e| ConfigError::Remote(format!("{}: {}", endpoint, e)))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| ConfigError::Remote(format!("{}: invalid JSON: {}", endpoint, e)))
    }

    /// Fetch both remote documents and merge them into a full-form document.
    pub async fn fetch_document(&self) -> ConfigResult<Value> {
        let scanners = self.get_json("getConfigScanner").await?;
        let root = self.get_json("getConfigRoot").await?;
        merge_documents(&root, &scanners)
    }

    /// Fetch and parse the remote configuration.
    pub async fn fetch(&self) -> ConfigResult<ConfigLoad> {
        let document = self.fetch_document().await?;
        let (config, warnings) = AppConfig::from_document(&document)?;
        Ok(ConfigLoad {
            config,
            source: ConfigSource::Remote(self.base_url.clone()),
            warnings,
        })
    }

    /// Fetch the remote configuration, falling back to the local file on any failure.
    pub async fn fetch_or_local(&self, local: &Path) -> ConfigResult<ConfigLoad> {
        match self.fetch().await {
            Ok(load) => Ok(load),
            Err(e) => {
                let mut load = AppConfig::load_from(local)?;
                load.warnings
                    .insert(0, format!("remote configuration failed, using local: {}", e));
                Ok(load)
            }
        }
    }

    /// Replace the local file with the remote configuration, keeping a backup.
    pub async fn pull_to(&self, path: &Path) -> ConfigResult<Option<PathBuf>> {
        let document = self.fetch_document().await?;
        // Reject documents the loader would not accept before touching disk.
        AppConfig::from_document(&document)?;
        let backup = write_with_backup(&document, path)?;
        info!(path = %path.display(), device = %self.device, "local configuration updated from remote");
        Ok(backup)
    }
}

/// Merge the root settings document and the scanner list document.
pub fn merge_documents(root: &Value, scanners: &Value) -> ConfigResult<Value> {
    let log_level = root
        .get("log_level")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::Remote("root configuration lacks log_level".into()))?;
    let retention = root
        .get("log_retention_days")
        .and_then(retention_days)
        .ok_or_else(|| ConfigError::Remote("root configuration lacks log_retention_days".into()))?;
    let list = scanners
        .get("scanner_configurations")
        .filter(|v| v.is_array())
        .ok_or_else(|| {
            ConfigError::Remote("scanner configuration lacks scanner_configurations".into())
        })?;

    Ok(json!({
        "log_level": log_level,
        "log_retention_days": retention,
        "scanner_configurations": list,
    }))
}

/// Write `document` to `path`, copying any existing file to `<path>.backup` first.
pub fn write_with_backup(document: &Value, path: &Path) -> ConfigResult<Option<PathBuf>> {
    let backup = if path.exists() {
        let mut name = path.as_os_str().to_owned();
        name.push(".backup");
        let backup = PathBuf::from(name);
        fs::copy(path, &backup).map_err(|e| ConfigError::WriteFailed {
            path: backup.clone(),
            reason: e.to_string(),
        })?;
        Some(backup)
    } else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        None
    };

    let content = serde_json::to_string_pretty(document)?;
    fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if backup.is_none() {
        warn!(path = %path.display(), "no previous configuration to back up");
    }
    Ok(backup)
}
