//! WebSocket message types for xfyun TTS.
//!
//! # Outbound
//!
//! A single [`SynthesisRequestFrame`] per session, carrying the whole text
//! with `data.status = 2` (first and last frame at once).
//!
//! # Inbound
//!
//! [`ServiceFrame`]s with a business `code` (0 = success) and an optional
//! `data` block holding one base64 audio chunk and the stream status.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::TEXT_ENCODING;
use super::config::{XfyunCredentials, XfyunTtsConfig};

// =============================================================================
// Outbound Messages
// =============================================================================

/// Stream position flag used in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FrameStatus {
    /// First chunk
    Begin,
    /// Intermediate chunk
    Continue,
    /// Last chunk
    End,
}

impl FrameStatus {
    #[inline]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl TryFrom<u8> for FrameStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Begin),
            1 => Ok(Self::Continue),
            2 => Ok(Self::End),
            other => Err(format!("unknown frame status: {other}")),
        }
    }
}

impl From<FrameStatus> for u8 {
    fn from(status: FrameStatus) -> Self {
        match status {
            FrameStatus::Begin => 0,
            FrameStatus::Continue => 1,
            FrameStatus::End => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommonParams {
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessParams {
    /// Audio encoding (`lame` / `raw`)
    pub aue: String,
    /// Streamed mp3 flag, only meaningful with `lame`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sfl: Option<u8>,
    /// Audio format, e.g. `audio/L16;rate=16000`
    pub auf: String,
    /// Voice
    pub vcn: String,
    pub speed: u8,
    pub volume: u8,
    pub pitch: u8,
    /// Background sound
    pub bgs: u8,
    /// Text encoding
    pub tte: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestData {
    pub status: FrameStatus,
    /// Base64 of the UTF-8 text
    pub text: String,
}

/// The one frame a session sends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthesisRequestFrame {
    pub common: CommonParams,
    pub business: BusinessParams,
    pub data: RequestData,
}

impl SynthesisRequestFrame {
    /// Builds the request for `text` from the configured business parameters.
    pub fn new(text: &str, config: &XfyunTtsConfig, credentials: &XfyunCredentials) -> Self {
        Self {
            common: CommonParams {
                app_id: credentials.app_id.clone(),
            },
            business: BusinessParams {
                aue: config.encoding.as_str().to_string(),
                sfl: config.encoding.is_streamed_mp3().then_some(1),
                auf: config.audio_format(),
                vcn: config.voice.clone(),
                speed: config.speed,
                volume: config.volume,
                pitch: config.pitch,
                bgs: u8::from(config.background_sound),
                tte: TEXT_ENCODING.to_string(),
            },
            data: RequestData {
                status: FrameStatus::End,
                text: BASE64.encode(text.as_bytes()),
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Audio block of a successful service frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AudioPayload {
    /// Base64 audio chunk; may be absent or empty
    #[serde(default)]
    pub audio: Option<String>,
    pub status: FrameStatus,
    /// Synthesis progress marker
    #[serde(default)]
    pub ced: Option<String>,
}

impl AudioPayload {
    /// Whether this block carries the last audio chunk.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    /// Decodes the audio chunk, or returns empty bytes when there is none.
    pub fn decode_audio(&self) -> Result<Bytes, base64::DecodeError> {
        match self.audio.as_deref() {
            Some(audio) if !audio.is_empty() => BASE64.decode(audio).map(Bytes::from),
            _ => Ok(Bytes::new()),
        }
    }
}

/// One inbound frame from the service.
///
/// `data` stays untyped until `code` has been checked: error frames may carry
/// an empty or partial block.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceFrame {
    /// Business status code, 0 means success
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    /// Session ID assigned by the service
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ServiceFrame {
    /// Parses a raw frame payload.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Decodes the audio block of a success frame.
    pub fn payload(&self) -> Result<AudioPayload, serde_json::Error> {
        match &self.data {
            Some(data) => AudioPayload::deserialize(data),
            None => Err(<serde_json::Error as serde::de::Error>::missing_field(
                "data",
            )),
        }
    }
}
