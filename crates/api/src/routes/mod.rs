pub mod events;
pub mod health;
pub mod notifications;
pub mod preferences;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::ws;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(events::router())
        .merge(notifications::router())
        .merge(preferences::router())
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
