//! `GET /api/settings` and `POST /api/settings`

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::settings::Settings;
use crate::state::AppState;

/// Returns the stored settings; a missing or unreadable file reads as empty.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Response {
    let settings = state.settings.load().await;
    Json(json!({
        "success": true,
        "settings": settings
    }))
    .into_response()
}

/// Replaces the stored settings with the request body.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Settings>, JsonRejection>,
) -> Response {
    let settings = match payload {
        Ok(Json(settings)) => settings,
        Err(rejection) => {
            error!("Invalid settings body: {rejection}");
            return save_failed();
        }
    };

    match state.settings.save(&settings).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "settings saved"
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to save settings: {e}");
            save_failed()
        }
    }
}

fn save_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "failed to save settings"
        })),
    )
        .into_response()
}
