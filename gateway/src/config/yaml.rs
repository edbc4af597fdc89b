use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   tls:
///     enabled: true
///     cert_path: "/etc/ssl/gateway.pem"
///     key_path: "/etc/ssl/gateway.key"
///
/// xfyun:
///   endpoint: "wss://tts-api.xfyun.cn/v2/tts"
///   voice: "x4_yezi"
///   timeout_ms: 10000
///   app_id: "your-app-id"
///   api_key: "your-api-key"
///   api_secret: "your-api-secret"
///
/// settings:
///   path: "/var/lib/transit-voice/settings.json"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub xfyun: Option<XfyunYaml>,
    pub settings: Option<SettingsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Speech synthesis service configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct XfyunYaml {
    /// WebSocket endpoint (ws:// or wss://)
    pub endpoint: Option<String>,
    /// Speaker name (`vcn`)
    pub voice: Option<String>,
    /// Per-request synthesis timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Server-level fallback credentials, used when the settings file has none
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

/// Settings store configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SettingsYaml {
    pub path: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
