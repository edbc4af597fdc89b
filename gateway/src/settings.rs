//! File-backed application settings.
//!
//! The browser UI saves its provider keys here through `/api/settings`. The
//! file is plain pretty-printed JSON with camelCase keys; it is read fresh on
//! every request so edits take effect without a restart.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::tts::xfyun::XfyunCredentials;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Keys configured from the settings page.
///
/// Unset fields are omitted from the file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Map provider key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amap_key: Option<String>,
    /// Transit data provider account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apihz_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apihz_key: Option<String>,
    /// Realtime bus provider key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_key: Option<String>,
    /// Speech synthesis credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfyun_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfyun_api_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xfyun_api_key: Option<String>,
}

impl Settings {
    /// Synthesis credentials, when all three fields are present and non-blank.
    pub fn xfyun_credentials(&self) -> Option<XfyunCredentials> {
        XfyunCredentials::from_parts(
            self.xfyun_app_id.as_deref(),
            self.xfyun_api_key.as_deref(),
            self.xfyun_api_secret.as_deref(),
        )
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Settings")
            .field("amap_key", &redact(&self.amap_key))
            .field("apihz_id", &self.apihz_id)
            .field("apihz_key", &redact(&self.apihz_key))
            .field("bus_key", &redact(&self.bus_key))
            .field("xfyun_app_id", &self.xfyun_app_id)
            .field("xfyun_api_secret", &redact(&self.xfyun_api_secret))
            .field("xfyun_api_key", &redact(&self.xfyun_api_key))
            .finish()
    }
}

/// Reads and writes [`Settings`] at a fixed path.
///
/// Writes are serialized and replace the file atomically; readers never see a
/// half-written file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the settings file. A missing file yields empty settings.
    pub async fn try_load(&self) -> SettingsResult<Settings> {
        let _guard = self.lock.read().await;
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Settings file not found, using empty settings");
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the settings file, treating any failure as empty settings.
    pub async fn load(&self) -> Settings {
        match self.try_load().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring unreadable settings file: {e}");
                Settings::default()
            }
        }
    }

    /// Replaces the settings file with `settings`.
    pub async fn save(&self, settings: &Settings) -> SettingsResult<()> {
        let contents = serde_json::to_string_pretty(settings)?;

        let _guard = self.lock.write().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, contents.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
