pub mod xfyun;

pub use xfyun::{
    SessionConnector, SessionTransport, SynthesisError, SynthesisResult, XFYUN_TTS_URL,
    XfyunAudioEncoding, XfyunCredentials, XfyunTts, XfyunTtsConfig,
};
