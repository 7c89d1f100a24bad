//! Inbound event ingestion.
//!
//! Producers (the external REST handlers) post typed events here;
//! acceptance is fire-and-forget. Persistence and delivery happen on the
//! bus handlers, so a notification failure can never fail the producing
//! request.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use herald_common::error::AppError;
use herald_events::{AppEvent, EventKind};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/events", post(ingest_event))
}

/// Inbound event envelope. The kind is validated explicitly so unknown
/// types answer 400 instead of a generic deserialize rejection.
#[derive(Debug, Deserialize)]
struct IngestEventRequest {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// POST /api/events — Publish an application event to the pipeline.
async fn ingest_event(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(req): Json<IngestEventRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let kind: EventKind = serde_json::from_value(serde_json::Value::String(req.kind.clone()))
        .map_err(|_| AppError::Validation(format!("Unknown event type '{}'", req.kind)))?;

    if !req.payload.is_object() {
        return Err(AppError::Validation(
            "Event payload must be a JSON object".to_string(),
        ));
    }

    tracing::debug!(kind = %kind, "Event accepted");
    state.bus.publish(AppEvent::new(kind, req.payload));

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"accepted": true})),
    ))
}
