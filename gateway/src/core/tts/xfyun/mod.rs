//! iFlytek (xfyun) online speech synthesis over WebSocket.
//!
//! This module provides a single-shot streaming synthesis client for the
//! xfyun TTS WebSocket API v2:
//!
//! - HMAC-SHA256 request signing carried entirely in the session URL
//! - One request frame per session (`data.status = 2`)
//! - Chunked base64 audio reassembled in arrival order
//! - Typed failures for service rejections, transport errors, malformed
//!   frames and sessions that close before the final chunk
//!
//! # Architecture
//!
//! - [`auth`]: canonical request line, signature and session URL
//! - [`config`]: credentials and business parameters
//! - [`messages`]: outbound request frame and inbound service frames
//! - [`transport`]: the socket seam (`SessionConnector` / `SessionTransport`)
//! - [`client`]: the `XfyunTts` client and the per-call session state machine
//!
//! # Example
//!
//! ```rust,no_run
//! use transit_voice_gateway::core::tts::xfyun::{XfyunCredentials, XfyunTts, XfyunTtsConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let tts = XfyunTts::new(XfyunTtsConfig::default())?;
//! let credentials = XfyunCredentials::new("app-id", "api-key", "api-secret");
//!
//! let mp3 = tts.synthesize("前方到站，人民广场", &credentials).await?;
//! println!("received {} bytes of audio", mp3.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Wire Protocol
//!
//! | Direction | Frame |
//! |-----------|-------|
//! | client → server | `{"common":{app_id},"business":{aue,sfl,auf,vcn,speed,volume,pitch,bgs,tte},"data":{status:2,text}}` |
//! | server → client | `{"code":0,"message":"success","sid":"…","data":{"audio":"…","status":1\|2,"ced":"…"}}` |

pub mod auth;
pub mod client;
pub mod config;
pub mod messages;
pub mod transport;


pub use auth::{SignedRequest, build_session_url, encode_query_component, rfc1123_now, sign_request};
pub use client::{SessionState, SynthesisError, SynthesisResult, SynthesisSession, XfyunTts};
pub use config::{XfyunAudioEncoding, XfyunCredentials, XfyunTtsConfig};
pub use messages::{AudioPayload, FrameStatus, ServiceFrame, SynthesisRequestFrame};
pub use transport::{
    SessionConnector, SessionTransport, TransportEvent, WebSocketConnector, WebSocketTransport,
};

// =============================================================================
// API Constants
// =============================================================================

/// xfyun streaming TTS endpoint.
pub const XFYUN_TTS_URL: &str = "wss://tts-api.xfyun.cn/v2/tts";

/// HMAC algorithm identifier embedded in the authorization descriptor.
pub const SIGNATURE_ALGORITHM: &str = "hmac-sha256";

/// Header names covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "host date request-line";

/// Protocol version used in the canonical request line.
pub const REQUEST_LINE_PROTOCOL: &str = "HTTP/1.1";

// =============================================================================
// Limits and Defaults
// =============================================================================

/// Default speaker: multi-dialect voice that needs no dialect switching.
pub const DEFAULT_VOICE: &str = "x4_yezi";

/// Default speed, volume and pitch on the service's 0..=100 scale.
pub const DEFAULT_SPEED: u8 = 50;
pub const DEFAULT_VOLUME: u8 = 50;
pub const DEFAULT_PITCH: u8 = 50;

/// Upper bound for speed, volume and pitch.
pub const MAX_PROSODY_VALUE: u8 = 100;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// Text encoding declared in the request (`tte`).
pub const TEXT_ENCODING: &str = "UTF8";

/// Business codes the service uses for authentication/authorization failures.
///
/// 401 and 403 are the HTTP statuses returned when the signed upgrade request
/// itself is refused.
pub const CREDENTIAL_ERROR_CODES: &[i64] = &[401, 403, 10005, 10313, 11200];
