//! Configuration module for the transit voice gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use transit_voice_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::tts::xfyun::{XfyunCredentials, XfyunTtsConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";
pub const DEFAULT_SYNTHESIS_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_BURST_SIZE: u32 = 10;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Settings store location
/// - Speech synthesis endpoint, voice, timeout and fallback credentials
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// JSON file backing `/api/settings`
    pub settings_path: PathBuf,

    // Speech synthesis
    /// WebSocket endpoint of the synthesis service
    pub xfyun_endpoint: String,
    /// Speaker used for every request
    pub xfyun_voice: String,
    /// Upper bound for one synthesis, in milliseconds
    pub synthesis_timeout_ms: u64,
    /// Server-level credentials, used when the settings store has none
    pub xfyun_app_id: Option<String>,
    pub xfyun_api_key: Option<String>,
    pub xfyun_api_secret: Option<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.xfyun_api_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.xfyun_api_secret {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (including `.env`) and defaults
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_all(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded into the environment by main.rs at startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_all(&config)?;

        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Server-level synthesis credentials, when all three are configured.
    pub fn xfyun_credentials(&self) -> Option<XfyunCredentials> {
        XfyunCredentials::from_parts(
            self.xfyun_app_id.as_deref(),
            self.xfyun_api_key.as_deref(),
            self.xfyun_api_secret.as_deref(),
        )
    }

    /// Synthesis parameters derived from this configuration.
    pub fn tts_config(&self) -> XfyunTtsConfig {
        XfyunTtsConfig::default()
            .with_endpoint(self.xfyun_endpoint.clone())
            .with_voice(self.xfyun_voice.clone())
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{cleanup_env_vars, test_config};
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_address() {
        let mut config = test_config();
        config.host = "127.0.0.1".to_string();
        config.port = 8080;
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert!(!config.is_tls_enabled());
    }

    #[test]
    fn test_xfyun_credentials_require_all_fields() {
        let mut config = test_config();
        assert!(config.xfyun_credentials().is_none());

        config.xfyun_app_id = Some("app".to_string());
        config.xfyun_api_key = Some("key".to_string());
        assert!(config.xfyun_credentials().is_none());

        config.xfyun_api_secret = Some("secret".to_string());
        let creds = config.xfyun_credentials().unwrap();
        assert_eq!(creds.app_id, "app");
        assert_eq!(creds.api_secret, "secret");
    }

    #[test]
    fn test_tts_config_uses_endpoint_and_voice() {
        let mut config = test_config();
        config.xfyun_endpoint = "ws://127.0.0.1:9001/v2/tts".to_string();
        config.xfyun_voice = "xiaoyan".to_string();

        let tts = config.tts_config();
        assert_eq!(tts.endpoint, "ws://127.0.0.1:9001/v2/tts");
        assert_eq!(tts.voice, "xiaoyan");
        assert_eq!(tts.speed, 50);
        assert!(tts.validate().is_ok());
    }

    #[test]
    fn test_synthesis_timeout() {
        let mut config = test_config();
        assert_eq!(config.synthesis_timeout(), Duration::from_secs(10));
        config.synthesis_timeout_ms = 250;
        assert_eq!(config.synthesis_timeout(), Duration::from_millis(250));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_timeout() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TTS_TIMEOUT_MS", "0");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("timeout"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

xfyun:
  voice: "xiaoyan"
  timeout_ms: 3000
  app_id: "yaml-app"
  api_key: "yaml-key"
  api_secret: "yaml-secret"

settings:
  path: "/tmp/yaml-settings.json"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.xfyun_voice, "xiaoyan");
        assert_eq!(config.synthesis_timeout_ms, 3000);
        assert_eq!(config.settings_path, PathBuf::from("/tmp/yaml-settings.json"));
        assert!(config.xfyun_credentials().is_some());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"

xfyun:
  api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("PORT", "4000");
            env::set_var("XFYUN_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.xfyun_api_key, Some("yaml-key".to_string()));
        // ENV value
        assert_eq!(config.port, 4000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_endpoint() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "xfyun:\n  endpoint: \"https://tts-api.xfyun.cn/v2/tts\"\n",
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("ws or wss"));

        cleanup_env_vars();
    }
}
