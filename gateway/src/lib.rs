pub mod config;
pub mod core;
pub mod handlers;
pub mod routes;
pub mod settings;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use settings::{Settings, SettingsError, SettingsStore};
pub use state::AppState;
