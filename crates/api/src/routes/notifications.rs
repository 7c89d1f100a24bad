//! Notification feed routes — the pull-based query surface.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_engine::store::{FeedPage, NotificationStore};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/notifications/read-all", post(mark_all_read))
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

/// GET /api/notifications — Paginated feed for the authenticated user.
///
/// Fetching the feed is the in-app catch-up: returned rows are marked
/// in-app delivered.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, AppError> {
    let feed = NotificationStore::fetch_feed(
        &state.pool,
        auth.user_id,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(20),
    )
    .await?;
    Ok(Json(feed))
}

/// GET /api/notifications/unread-count — Unread total for the user.
async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let unread = NotificationStore::unread_count(&state.pool, auth.user_id).await?;
    Ok(Json(serde_json::json!({"unread": unread})))
}

/// POST /api/notifications/:id/read — Mark one notification read.
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let changed = NotificationStore::mark_read(&state.pool, id, auth.user_id).await?;
    if changed {
        Ok(Json(serde_json::json!({"read": true})))
    } else {
        Err(AppError::NotFound(format!("Notification {} not found", id)))
    }
}

/// POST /api/notifications/read-all — Mark every notification read.
async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let changed = NotificationStore::mark_all_read(&state.pool, auth.user_id).await?;
    Ok(Json(serde_json::json!({"read": changed})))
}
