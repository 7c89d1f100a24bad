//! Preference resolver — computes whether delivery is permitted for a
//! `(user, notification type, channel)` tuple.
//!
//! Preference rows are created lazily with defaults on first access (all
//! channels on except SMS, all types enabled) and mutated only by the
//! owning user. The delivery router treats resolver errors as "not
//! permitted" — a degraded store must never override an explicit opt-out.

use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Channel, NotificationType, Preference};

/// Service layer for notification preferences.
pub struct PreferenceService;

/// Parameters for updating a user's preferences. Omitted fields keep
/// their current value.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdatePreferenceParams {
    pub in_app: Option<bool>,
    pub email: Option<bool>,
    pub push: Option<bool>,
    pub sms: Option<bool>,
    pub type_overrides: Option<serde_json::Value>,
}

impl PreferenceService {
    /// Load a user's preferences, creating the default row on first access.
    pub async fn get_or_create(pool: &PgPool, user_id: Uuid) -> Result<Preference, AppError> {
        // Idempotent default creation; concurrent first accesses are fine.
        sqlx::query(
            "INSERT INTO notification_preferences (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        let pref: Preference =
            sqlx::query_as("SELECT * FROM notification_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(pref)
    }

    /// Effective permission for `(user, type, channel)`.
    ///
    /// Pure function of stored state; the only side effect is lazy default
    /// creation. Callers that cannot tolerate an error must fail closed.
    pub async fn resolve(
        pool: &PgPool,
        user_id: Uuid,
        notification_type: NotificationType,
        channel: Channel,
    ) -> Result<bool, AppError> {
        let pref = Self::get_or_create(pool, user_id).await?;
        Ok(pref.allows(notification_type, channel))
    }

    /// Update a user's preferences.
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        params: &UpdatePreferenceParams,
    ) -> Result<Preference, AppError> {
        let existing = Self::get_or_create(pool, user_id).await?;

        let in_app = params.in_app.unwrap_or(existing.in_app);
        let email = params.email.unwrap_or(existing.email);
        let push = params.push.unwrap_or(existing.push);
        let sms = params.sms.unwrap_or(existing.sms);
        let type_overrides = params
            .type_overrides
            .clone()
            .unwrap_or(existing.type_overrides);

        let pref: Preference = sqlx::query_as(
            r#"
            UPDATE notification_preferences
            SET in_app = $2, email = $3, push = $4, sms = $5,
                type_overrides = $6, updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(in_app)
        .bind(email)
        .bind(push)
        .bind(sms)
        .bind(&type_overrides)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = %user_id, "Notification preferences updated");

        Ok(pref)
    }
}
