//! `POST /api/tts`
//!
//! Synthesizes announcement text, as given, and returns it as base64 mp3.
//! Every failure other than a missing or empty text is answered with `200`
//! and `fallback: true`, so the browser switches to its on-device voice
//! instead of showing an error.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Request body
#[derive(Debug, Clone, Deserialize)]
pub struct SpeakRequest {
    /// Text to synthesize
    #[serde(default)]
    pub text: Option<String>,
    /// Playback-rate multiplier, 1.0 is normal speed
    #[serde(default)]
    pub speed: Option<f32>,
}

/// Successful synthesis
#[derive(Debug, Clone, Serialize)]
pub struct SpeakResponse {
    pub success: bool,
    /// Base64 audio
    pub audio: String,
    pub format: &'static str,
}

/// Synthesis unavailable; the client should speak locally
#[derive(Debug, Clone, Serialize)]
pub struct FallbackResponse {
    pub success: bool,
    pub error: String,
    pub fallback: bool,
    /// Machine-readable cause
    pub reason: &'static str,
}

fn fallback(error: &str, reason: &'static str) -> Response {
    (
        StatusCode::OK,
        Json(FallbackResponse {
            success: false,
            error: error.to_string(),
            fallback: true,
            reason,
        }),
    )
        .into_response()
}

/// Handler for `POST /api/tts`
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SpeakRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected TTS request body: {rejection}");
            return fallback("speech synthesis failed", "invalid_request");
        }
    };

    let text = request.text.as_deref().unwrap_or_default();
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": "text is required"
            })),
        )
            .into_response();
    }

    let Some((credentials, source)) = state.resolve_credentials().await else {
        info!("Speech synthesis not configured, signalling local fallback");
        return fallback("speech synthesis is not configured", "missing_credentials");
    };

    let tts = match request.speed {
        Some(speed) => {
            let config = state.tts.config().clone().with_rate_multiplier(speed);
            match state.tts.with_config(config) {
                Ok(tts) => tts,
                Err(e) => {
                    error!("Invalid synthesis parameters: {e}");
                    return fallback("speech synthesis unavailable", e.kind());
                }
            }
        }
        None => state.tts.clone(),
    };

    debug!(
        chars = text.chars().count(),
        speed = tts.config().speed,
        credentials = source.as_str(),
        "Synthesizing announcement"
    );

    match tts
        .synthesize_with_timeout(text, &credentials, state.config.synthesis_timeout())
        .await
    {
        Ok(audio) => (
            StatusCode::OK,
            Json(SpeakResponse {
                success: true,
                audio: BASE64.encode(&audio),
                format: tts.config().encoding.format_name(),
            }),
        )
            .into_response(),
        Err(e) => {
            if e.is_credentials_invalid() {
                warn!(
                    credentials = source.as_str(),
                    "xfyun rejected the configured credentials: {e}"
                );
            } else {
                warn!(kind = e.kind(), "Speech synthesis failed: {e}");
            }
            fallback("speech synthesis unavailable", e.kind())
        }
    }
}
