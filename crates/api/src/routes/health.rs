//! Health check endpoint.
//!
//! Backplane loss is a degradation, not an outage: the service keeps
//! serving with local-process real-time delivery, and reports it here.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let backplane = if state.fanout.backplane_healthy() {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": "ok",
        "service": "herald-api",
        "version": env!("CARGO_PKG_VERSION"),
        "backplane": backplane,
    }))
}
