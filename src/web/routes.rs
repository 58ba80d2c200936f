use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::state::AppState;

/// Create the diagnostic router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/buttons", get(handlers::list_buttons))
        .route(
            "/buttons/host-selector/position",
            get(handlers::host_selector_position),
        )
        .route("/buttons/:name/press", post(handlers::button_press))
        .route("/buttons/:name/long-press", post(handlers::button_long_press));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
