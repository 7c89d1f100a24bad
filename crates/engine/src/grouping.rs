//! Grouping/dedup engine — collapses near-duplicate notifications.
//!
//! Events sharing a grouping key `(recipient, type, resource_type,
//! resource_id)` inside the grouping window update one row instead of
//! inserting new ones. Concurrent writers of the same key — including
//! handlers on different processes — are serialized by a per-key Postgres
//! advisory lock held for the transaction, so at-most-one row per key per
//! window is an invariant, not a best effort.
//!
//! The window is recomputed strictly per event relative to `now()`: a
//! burst straddling the boundary splits into two rows.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, NotificationType, ResourceType};

use crate::templates;

/// Default grouping window in seconds (1 hour).
pub const DEFAULT_GROUP_WINDOW_SECS: u64 = 3600;

/// A candidate notification, before grouping decides insert-vs-update.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    /// Structured payload extract; the engine adds/maintains `count`.
    pub data: serde_json::Value,
}

impl NotificationDraft {
    /// Lock key for the grouping tuple.
    fn grouping_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.recipient_id, self.notification_type, self.resource_type, self.resource_id
        )
    }
}

/// Result of applying a draft to the store.
#[derive(Debug, Clone)]
pub struct GroupingOutcome {
    pub notification: Notification,
    /// True when an existing in-window row was updated.
    pub grouped: bool,
}

/// Applies candidate notifications with window-based dedup.
pub struct GroupingEngine {
    window_secs: u64,
}

impl GroupingEngine {
    pub fn new(window_secs: u64) -> Self {
        Self { window_secs }
    }

    /// Insert-or-update a candidate notification.
    ///
    /// Runs in one transaction: take the per-key advisory lock, look for
    /// an open row inside the window, then either bump its count (re-render
    /// message, reset `is_read`) or insert a fresh row with `count = 1`.
    pub async fn apply(
        &self,
        pool: &PgPool,
        draft: NotificationDraft,
    ) -> Result<GroupingOutcome, AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(draft.grouping_key())
            .execute(&mut *tx)
            .await?;

        let window_start = Utc::now() - Duration::seconds(self.window_secs as i64);

        let existing: Option<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
              AND notification_type = $2
              AND resource_type = $3
              AND resource_id = $4
              AND created_at >= $5
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(draft.recipient_id)
        .bind(draft.notification_type)
        .bind(draft.resource_type)
        .bind(draft.resource_id)
        .bind(window_start)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(row) => {
                let new_count = row.count() + 1;
                let message = templates::render(draft.notification_type, new_count, &draft.data);

                let updated: Notification = sqlx::query_as(
                    r#"
                    UPDATE notifications
                    SET data = jsonb_set(data, '{count}', to_jsonb($2::bigint)),
                        message = $3,
                        is_read = FALSE,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(row.id)
                .bind(new_count)
                .bind(&message)
                .fetch_one(&mut *tx)
                .await?;

                tracing::debug!(
                    notification_id = %updated.id,
                    count = new_count,
                    "Grouped into existing notification"
                );

                GroupingOutcome {
                    notification: updated,
                    grouped: true,
                }
            }
            None => {
                let id = Uuid::new_v4();
                let mut data = draft.data.clone();
                if let Some(obj) = data.as_object_mut() {
                    obj.insert("count".to_string(), serde_json::json!(1));
                }
                let message = templates::render(draft.notification_type, 1, &data);

                let inserted: Notification = sqlx::query_as(
                    r#"
                    INSERT INTO notifications
                        (id, recipient_id, sender_id, notification_type, resource_type,
                         resource_id, message, data)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(draft.recipient_id)
                .bind(draft.sender_id)
                .bind(draft.notification_type)
                .bind(draft.resource_type)
                .bind(draft.resource_id)
                .bind(&message)
                .bind(&data)
                .fetch_one(&mut *tx)
                .await?;

                tracing::debug!(notification_id = %inserted.id, "Notification created");

                GroupingOutcome {
                    notification: inserted,
                    grouped: false,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_WINDOW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_key_is_stable() {
        let recipient = Uuid::new_v4();
        let resource = Uuid::new_v4();
        let make = || NotificationDraft {
            recipient_id: recipient,
            sender_id: Some(Uuid::new_v4()),
            notification_type: NotificationType::Like,
            resource_type: ResourceType::Video,
            resource_id: resource,
            data: serde_json::json!({}),
        };
        // Sender is not part of the grouping key.
        assert_eq!(make().grouping_key(), make().grouping_key());
    }

    #[test]
    fn test_grouping_key_differs_per_resource() {
        let recipient = Uuid::new_v4();
        let make = |resource| NotificationDraft {
            recipient_id: recipient,
            sender_id: None,
            notification_type: NotificationType::Like,
            resource_type: ResourceType::Video,
            resource_id: resource,
            data: serde_json::json!({}),
        };
        assert_ne!(
            make(Uuid::new_v4()).grouping_key(),
            make(Uuid::new_v4()).grouping_key()
        );
    }
}
