pub mod tts;

// Re-export commonly used types for convenience
pub use tts::xfyun::{
    SynthesisError, SynthesisResult, XfyunAudioEncoding, XfyunCredentials, XfyunTts,
    XfyunTtsConfig,
};
