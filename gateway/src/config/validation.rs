//! Configuration validation logic

use tracing::warn;

use super::ServerConfig;
use crate::core::tts::xfyun::XfyunTtsConfig;

/// Validate the synthesis endpoint and voice.
pub(super) fn validate_xfyun(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    XfyunTtsConfig::default()
        .with_endpoint(config.xfyun_endpoint.clone())
        .with_voice(config.xfyun_voice.clone())
        .validate()
        .map_err(|e| format!("Invalid xfyun configuration: {e}"))?;
    Ok(())
}

/// Validate that the synthesis timeout is non-zero.
pub(super) fn validate_timeout(timeout_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    if timeout_ms == 0 {
        return Err("TTS timeout must be greater than 0 ms".into());
    }
    Ok(())
}

/// Validate rate limiting values.
pub(super) fn validate_rate_limits(
    requests_per_second: u32,
    burst_size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    if requests_per_second == 0 {
        return Err("RATE_LIMIT_REQUESTS_PER_SECOND must be greater than 0".into());
    }
    if burst_size == 0 {
        return Err("RATE_LIMIT_BURST_SIZE must be greater than 0".into());
    }
    Ok(())
}

/// Warn when only some of the server-level credentials are configured.
///
/// Partial credentials are never used, so requests fall back to the settings
/// file or to local speech.
pub(super) fn check_credentials(config: &ServerConfig) {
    let present = [
        config.xfyun_app_id.is_some(),
        config.xfyun_api_key.is_some(),
        config.xfyun_api_secret.is_some(),
    ];
    let count = present.iter().filter(|p| **p).count();
    if count > 0 && count < present.len() {
        warn!(
            "Incomplete xfyun credentials in server configuration (need XFYUN_APP_ID, XFYUN_API_KEY and XFYUN_API_SECRET); they will be ignored"
        );
    }
}

/// Run every validation on a merged configuration.
pub(super) fn validate_all(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_xfyun(config)?;
    validate_timeout(config.synthesis_timeout_ms)?;
    validate_rate_limits(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    check_credentials(config);
    Ok(())
}
