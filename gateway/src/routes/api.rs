use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{settings, speak};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tts", post(speak::speak_handler))
        .route(
            "/api/settings",
            get(settings::get_settings).post(settings::save_settings),
        )
        .layer(TraceLayer::new_for_http())
}
