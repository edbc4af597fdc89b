//! Mock provider servers for integration tests
//!
//! - WebSocket: xfyun streaming TTS (signed handshake, chunked audio)

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod websocket_mock;

pub use websocket_mock::{MockBehavior, XfyunMockServer};

use transit_voice_gateway::core::tts::xfyun::XfyunCredentials;

/// Credentials the mock accepts
pub fn test_credentials() -> XfyunCredentials {
    XfyunCredentials::new("mock-app", "mock-api-key", "mock-api-secret")
}
