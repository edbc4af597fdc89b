//! Environment variable loading
//!
//! Reads every setting from the process environment (which already includes
//! `.env` values loaded by `main`) and fills in defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_HOST, DEFAULT_PORT, DEFAULT_RATE_LIMIT_BURST_SIZE, DEFAULT_RATE_LIMIT_RPS,
    DEFAULT_SETTINGS_PATH, DEFAULT_SYNTHESIS_TIMEOUT_MS, ServerConfig, TlsConfig,
};
use crate::core::tts::xfyun::{DEFAULT_VOICE, XFYUN_TTS_URL};

/// Read an environment variable, treating empty values as unset.
pub(super) fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
pub(super) fn parse_env<T: FromStr>(
    name: &str,
    default: T,
) -> Result<T, Box<dyn std::error::Error>> {
    match env_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("Invalid value for {name}: {raw}").into()),
        None => Ok(default),
    }
}

/// TLS settings from `TLS_CERT_PATH` / `TLS_KEY_PATH`.
///
/// Both must be set to enable TLS; setting only one is an error.
fn tls_from_env() -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("Both TLS_CERT_PATH and TLS_KEY_PATH must be set to enable TLS".into()),
    }
}

/// Build a configuration from environment variables and defaults only.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT", DEFAULT_PORT)?,
        tls: tls_from_env()?,
        settings_path: env_var("SETTINGS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
        xfyun_endpoint: env_var("XFYUN_TTS_URL").unwrap_or_else(|| XFYUN_TTS_URL.to_string()),
        xfyun_voice: env_var("XFYUN_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        synthesis_timeout_ms: parse_env("TTS_TIMEOUT_MS", DEFAULT_SYNTHESIS_TIMEOUT_MS)?,
        xfyun_app_id: env_var("XFYUN_APP_ID"),
        xfyun_api_key: env_var("XFYUN_API_KEY"),
        xfyun_api_secret: env_var("XFYUN_API_SECRET"),
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_env(
            "RATE_LIMIT_REQUESTS_PER_SECOND",
            DEFAULT_RATE_LIMIT_RPS,
        )?,
        rate_limit_burst_size: parse_env("RATE_LIMIT_BURST_SIZE", DEFAULT_RATE_LIMIT_BURST_SIZE)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::cleanup_env_vars;
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_from_env_defaults() {
        cleanup_env_vars();

        let config = load_from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.tls.is_none());
        assert_eq!(config.settings_path, PathBuf::from("settings.json"));
        assert_eq!(config.xfyun_endpoint, "wss://tts-api.xfyun.cn/v2/tts");
        assert_eq!(config.xfyun_voice, "x4_yezi");
        assert_eq!(config.synthesis_timeout_ms, 10_000);
        assert!(config.xfyun_app_id.is_none());
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.rate_limit_burst_size, 10);
    }

    #[test]
    #[serial]
    fn test_load_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "8088");
            env::set_var("XFYUN_APP_ID", "env-app");
            env::set_var("XFYUN_API_KEY", "env-key");
            env::set_var("XFYUN_API_SECRET", "env-secret");
            env::set_var("TTS_TIMEOUT_MS", "2500");
            env::set_var("SETTINGS_PATH", "/tmp/transit-settings.json");
        }

        let config = load_from_env().unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8088);
        assert_eq!(config.xfyun_app_id, Some("env-app".to_string()));
        assert_eq!(config.synthesis_timeout_ms, 2500);
        assert_eq!(
            config.settings_path,
            PathBuf::from("/tmp/transit-settings.json")
        );
        assert!(config.xfyun_credentials().is_some());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let err = load_from_env().unwrap_err();
        assert!(err.to_string().contains("Invalid value for PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_from_env_partial_tls() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }

        let err = load_from_env().unwrap_err();
        assert!(err.to_string().contains("TLS_KEY_PATH"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_empty_env_values_are_unset() {
        cleanup_env_vars();
        unsafe {
            env::set_var("XFYUN_APP_ID", "  ");
        }

        let config = load_from_env().unwrap();
        assert!(config.xfyun_app_id.is_none());

        cleanup_env_vars();
    }
}
