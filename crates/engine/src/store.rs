//! Notification store — persistence layer for notification records.
//!
//! Rows are created by the grouping engine, mutated only by grouping
//! updates, read-status mutations from the recipient, and delivery-status
//! updates from channel adapters. Deletion is left to an external
//! retention policy.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Channel, Notification, User};

/// Maximum feed page size.
const MAX_PER_PAGE: i64 = 100;

/// One page of a recipient's notification feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub notifications: Vec<Notification>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Service layer for notification persistence.
pub struct NotificationStore;

impl NotificationStore {
    /// Fetch one page of a recipient's feed, newest first.
    ///
    /// Fetching the feed is the pull-based in-app catch-up: every returned
    /// row gets `delivery_status.in_app` marked delivered.
    pub async fn fetch_feed(
        pool: &PgPool,
        recipient_id: Uuid,
        page: i64,
        per_page: i64,
    ) -> Result<FeedPage, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let offset = (page - 1) * per_page;

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1")
                .bind(recipient_id)
                .fetch_one(pool)
                .await?;

        let notifications: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(recipient_id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let ids: Vec<Uuid> = notifications.iter().map(|n| n.id).collect();
        if !ids.is_empty() {
            sqlx::query(
                r#"
                UPDATE notifications
                SET delivery_status = jsonb_set(
                        delivery_status,
                        '{in_app}',
                        jsonb_build_object('delivered', true, 'timestamp', to_jsonb(NOW())),
                        true
                    ),
                    updated_at = NOW()
                WHERE id = ANY($1)
                  AND (delivery_status #>> '{in_app,delivered}') IS DISTINCT FROM 'true'
                "#,
            )
            .bind(&ids)
            .execute(pool)
            .await?;
        }

        Ok(FeedPage {
            notifications,
            page,
            per_page,
            total: total.0,
        })
    }

    /// Number of unread notifications for a recipient.
    pub async fn unread_count(pool: &PgPool, recipient_id: Uuid) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await?;

        Ok(count.0)
    }

    /// Mark a single notification read. Returns false if the row does not
    /// exist or belongs to another recipient.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every notification of a recipient read. Returns the number of
    /// rows that changed.
    pub async fn mark_all_read(pool: &PgPool, recipient_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE recipient_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(recipient_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Record a successful delivery on one channel.
    pub async fn record_channel_delivery(
        pool: &PgPool,
        notification_id: Uuid,
        channel: Channel,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET delivery_status = jsonb_set(
                    delivery_status,
                    ARRAY[$2],
                    jsonb_build_object('delivered', true, 'timestamp', to_jsonb(NOW())),
                    true
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Load a user row (contact resolution for channel adapters).
    pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        Ok(user)
    }

    /// Subscriber ids of a channel owner (fan-out targets for new uploads).
    pub async fn subscribers_of(
        pool: &PgPool,
        channel_owner_id: Uuid,
    ) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT subscriber_id FROM subscriptions WHERE channel_owner_id = $1")
                .bind(channel_owner_id)
                .fetch_all(pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
