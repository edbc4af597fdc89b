//! Merging YAML and environment configurations
//!
//! Environment values (with defaults) form the base; any value present in the
//! YAML file replaces it.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig, env};

/// Build the final configuration: environment base, then YAML overrides.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                _ => {
                    if let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    } else if tls.enabled == Some(true) && config.tls.is_none() {
                        return Err(
                            "TLS is enabled but server.tls.cert_path or server.tls.key_path is missing"
                                .into(),
                        );
                    }
                }
            }
        }
    }

    if let Some(xfyun) = yaml.xfyun {
        if let Some(endpoint) = xfyun.endpoint {
            config.xfyun_endpoint = endpoint;
        }
        if let Some(voice) = xfyun.voice {
            config.xfyun_voice = voice;
        }
        if let Some(timeout_ms) = xfyun.timeout_ms {
            config.synthesis_timeout_ms = timeout_ms;
        }
        if xfyun.app_id.is_some() {
            config.xfyun_app_id = xfyun.app_id;
        }
        if xfyun.api_key.is_some() {
            config.xfyun_api_key = xfyun.api_key;
        }
        if xfyun.api_secret.is_some() {
            config.xfyun_api_secret = xfyun.api_secret;
        }
    }

    if let Some(path) = yaml.settings.and_then(|s| s.path) {
        config.settings_path = PathBuf::from(path);
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    Ok(config)
}
