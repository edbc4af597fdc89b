pub mod api;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Public health route plus the API routes, bound to `state`.
///
/// Cross-cutting layers (CORS, rate limiting, security headers) are added by
/// the binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/", get(handlers::api::health_check));

    public_routes
        .merge(api::create_api_router())
        .with_state(state)
}
