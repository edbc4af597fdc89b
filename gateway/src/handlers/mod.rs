//! HTTP request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `speak` - Text-to-speech with local-voice fallback signalling
//! - `settings` - Read and write the settings file

pub mod api;
pub mod settings;
pub mod speak;

// Re-export commonly used handlers for convenient access
pub use speak::speak_handler;
