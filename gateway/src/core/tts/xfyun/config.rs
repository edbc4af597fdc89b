//! Configuration types for xfyun streaming TTS.
//!
//! - [`XfyunCredentials`]: per-call application identity and signing keys
//! - [`XfyunAudioEncoding`]: output codec selection (`aue`)
//! - [`XfyunTtsConfig`]: endpoint and business parameters

use std::fmt;
use std::str::FromStr;

use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    DEFAULT_PITCH, DEFAULT_SAMPLE_RATE, DEFAULT_SPEED, DEFAULT_VOICE, DEFAULT_VOLUME,
    MAX_PROSODY_VALUE, XFYUN_TTS_URL,
};

// =============================================================================
// Credentials
// =============================================================================

/// Credentials for one synthesis call.
///
/// Supplied by value by the caller (settings store or server configuration).
/// Presence of every field is the caller's precondition; the client does not
/// check it and simply fails when the service refuses the handshake.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct XfyunCredentials {
    /// Application ID (`common.app_id`).
    pub app_id: String,
    /// API key embedded in the authorization descriptor.
    pub api_key: String,
    /// API secret used as the HMAC key. Never sent over the wire.
    pub api_secret: String,
}

impl XfyunCredentials {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Builds credentials only when all three fields are present and non-blank.
    pub fn from_parts(
        app_id: Option<&str>,
        api_key: Option<&str>,
        api_secret: Option<&str>,
    ) -> Option<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }
        Some(Self::new(
            present(app_id)?,
            present(api_key)?,
            present(api_secret)?,
        ))
    }
}

impl fmt::Debug for XfyunCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XfyunCredentials")
            .field("app_id", &self.app_id)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Audio Encoding
// =============================================================================

/// Output audio encodings accepted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XfyunAudioEncoding {
    /// MP3 via the LAME encoder (default)
    #[default]
    Lame,
    /// Uncompressed PCM
    Raw,
}

impl XfyunAudioEncoding {
    /// Value of the `aue` business parameter.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lame => "lame",
            Self::Raw => "raw",
        }
    }

    /// Short format name reported to HTTP clients.
    #[inline]
    pub fn format_name(&self) -> &'static str {
        match self {
            Self::Lame => "mp3",
            Self::Raw => "pcm",
        }
    }

    /// Whether the `sfl` (streamed mp3) flag applies.
    #[inline]
    pub fn is_streamed_mp3(&self) -> bool {
        matches!(self, Self::Lame)
    }
}

impl FromStr for XfyunAudioEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lame" | "mp3" => Ok(Self::Lame),
            "raw" | "pcm" => Ok(Self::Raw),
            other => Err(format!("Unsupported xfyun audio encoding: {other}")),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Endpoint and business parameters for xfyun synthesis.
///
/// Defaults reproduce the fixed request the transit app sends: mp3, 16 kHz,
/// voice `x4_yezi`, speed/volume/pitch 50, no background sound.
#[derive(Debug, Clone, PartialEq)]
pub struct XfyunTtsConfig {
    /// WebSocket endpoint (`wss://tts-api.xfyun.cn/v2/tts`).
    pub endpoint: String,
    /// Speaker (`vcn`).
    pub voice: String,
    /// Output codec (`aue`).
    pub encoding: XfyunAudioEncoding,
    /// Sample rate for `auf` (8000 or 16000).
    pub sample_rate: u32,
    /// Speaking speed, 0..=100.
    pub speed: u8,
    /// Volume, 0..=100.
    pub volume: u8,
    /// Pitch, 0..=100.
    pub pitch: u8,
    /// Background sound (`bgs`).
    pub background_sound: bool,
}

impl Default for XfyunTtsConfig {
    fn default() -> Self {
        Self {
            endpoint: XFYUN_TTS_URL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            encoding: XfyunAudioEncoding::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
            pitch: DEFAULT_PITCH,
            background_sound: false,
        }
    }
}

impl XfyunTtsConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    /// Maps a playback-rate multiplier (1.0 = normal) onto the 0..=100 scale.
    pub fn with_rate_multiplier(self, rate: f32) -> Self {
        let scaled = (rate * f32::from(DEFAULT_SPEED)).round();
        let speed = if scaled.is_finite() {
            scaled.clamp(0.0, f32::from(MAX_PROSODY_VALUE)) as u8
        } else {
            DEFAULT_SPEED
        };
        self.with_speed(speed)
    }

    /// The `auf` business parameter.
    pub fn audio_format(&self) -> String {
        format!("audio/L16;rate={}", self.sample_rate)
    }

    /// Parses the endpoint URL.
    pub fn endpoint_url(&self) -> Result<Url, String> {
        Url::parse(&self.endpoint).map_err(|e| format!("Invalid xfyun endpoint: {e}"))
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = self.endpoint_url()?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(format!(
                "xfyun endpoint must use ws or wss, got: {}",
                url.scheme()
            ));
        }
        if url.host_str().is_none() {
            return Err("xfyun endpoint must have a host".to_string());
        }
        if self.voice.trim().is_empty() {
            return Err("Voice (vcn) must not be empty".to_string());
        }
        if !matches!(self.sample_rate, 8000 | 16000) {
            return Err(format!(
                "Sample rate {} Hz is not supported (8000 or 16000)",
                self.sample_rate
            ));
        }
        for (name, value) in [
            ("Speed", self.speed),
            ("Volume", self.volume),
            ("Pitch", self.pitch),
        ] {
            if value > MAX_PROSODY_VALUE {
                return Err(format!(
                    "{name} {value} is out of range (0-{MAX_PROSODY_VALUE})"
                ));
            }
        }
        Ok(())
    }
}
