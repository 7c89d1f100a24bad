//! Notification preference routes.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};

use herald_common::error::AppError;
use herald_common::types::Preference;
use herald_engine::preferences::{PreferenceService, UpdatePreferenceParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/preferences", get(get_preferences))
        .route("/api/preferences", put(update_preferences))
}

/// GET /api/preferences — The user's preferences, created with defaults
/// on first access.
async fn get_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Preference>, AppError> {
    let pref = PreferenceService::get_or_create(&state.pool, auth.user_id).await?;
    Ok(Json(pref))
}

/// PUT /api/preferences — Update the user's preferences.
async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<UpdatePreferenceParams>,
) -> Result<Json<Preference>, AppError> {
    let pref = PreferenceService::update(&state.pool, auth.user_id, &params).await?;
    Ok(Json(pref))
}
