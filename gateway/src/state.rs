use std::sync::Arc;

use tracing::debug;

use crate::config::ServerConfig;
use crate::core::tts::xfyun::{SynthesisResult, XfyunCredentials, XfyunTts};
use crate::settings::SettingsStore;

/// Where the credentials for a synthesis request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The settings file written by `/api/settings`
    Settings,
    /// `XFYUN_*` server configuration
    Server,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Server => "server",
        }
    }
}

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub settings: SettingsStore,
    pub tts: XfyunTts,
}

impl AppState {
    /// Builds the state with a WebSocket-backed synthesis client.
    pub fn new(config: ServerConfig) -> SynthesisResult<Arc<Self>> {
        let tts = XfyunTts::new(config.tts_config())?;
        Ok(Self::with_tts(config, tts))
    }

    /// Builds the state around an existing synthesis client.
    pub fn with_tts(config: ServerConfig, tts: XfyunTts) -> Arc<Self> {
        let settings = SettingsStore::new(config.settings_path.clone());
        Arc::new(Self {
            config,
            settings,
            tts,
        })
    }

    /// Credentials for one synthesis request.
    ///
    /// The settings file is read fresh on every call and wins when it holds a
    /// complete set; otherwise the server configuration is used.
    pub async fn resolve_credentials(&self) -> Option<(XfyunCredentials, CredentialSource)> {
        if let Some(credentials) = self.settings.load().await.xfyun_credentials() {
            return Some((credentials, CredentialSource::Settings));
        }
        let resolved = self
            .config
            .xfyun_credentials()
            .map(|credentials| (credentials, CredentialSource::Server));
        if resolved.is_none() {
            debug!("No xfyun credentials in settings or server configuration");
        }
        resolved
    }
}
