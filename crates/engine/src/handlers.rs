//! Pipeline event handlers — turn application events into notifications.
//!
//! One handler instance is registered on the bus for every event kind.
//! Per event: parse the typed payload, resolve recipients (suppressing
//! self-notifications), group-or-insert through the store, then hand the
//! row to the delivery router. Payload and store errors surface to the
//! bus boundary, where they are logged without touching the producer or
//! other handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;

use herald_common::types::{NotificationType, ResourceType};
use herald_events::event::{
    MentionPayload, NewCommentPayload, NewLikePayload, NewSubscriptionPayload, NewVideoPayload,
    VideoProcessedPayload,
};
use herald_events::{AppEvent, EventHandler, EventKind};

use crate::grouping::{GroupingEngine, NotificationDraft};
use crate::router::DeliveryRouter;
use crate::store::NotificationStore;

/// The notification pipeline, driven by bus events.
pub struct PipelineHandler {
    pool: PgPool,
    grouping: GroupingEngine,
    router: Arc<DeliveryRouter>,
}

impl PipelineHandler {
    pub fn new(pool: PgPool, grouping: GroupingEngine, router: Arc<DeliveryRouter>) -> Self {
        Self {
            pool,
            grouping,
            router,
        }
    }

    /// Resolve the event into zero or more notification drafts.
    async fn drafts_for(&self, event: &AppEvent) -> anyhow::Result<Vec<NotificationDraft>> {
        match event.kind {
            // Upload fan-out needs the subscriber list from the store.
            EventKind::NewVideo => {
                let payload: NewVideoPayload = parse_payload(event)?;
                let subscribers =
                    NotificationStore::subscribers_of(&self.pool, payload.uploader_id).await?;
                Ok(subscribers
                    .into_iter()
                    .filter(|subscriber| *subscriber != payload.uploader_id)
                    .map(|subscriber| NotificationDraft {
                        recipient_id: subscriber,
                        sender_id: Some(payload.uploader_id),
                        notification_type: NotificationType::VideoUpload,
                        resource_type: ResourceType::Video,
                        resource_id: payload.video_id,
                        data: json!({
                            "video_id": payload.video_id,
                            "actor_name": payload.uploader_name,
                            "title": payload.title,
                        }),
                    })
                    .collect())
            }
            _ => build_direct_drafts(event),
        }
    }
}

#[async_trait]
impl EventHandler for PipelineHandler {
    fn name(&self) -> &'static str {
        "notification_pipeline"
    }

    async fn handle(&self, event: AppEvent) -> anyhow::Result<()> {
        let drafts = self.drafts_for(&event).await?;
        if drafts.is_empty() {
            tracing::debug!(kind = %event.kind, "Event produced no notifications");
            return Ok(());
        }

        // Per-draft failures are collected, not short-circuited — one
        // recipient's store error must not starve the rest of a fan-out.
        let mut first_error = None;
        for draft in drafts {
            let recipient_id = draft.recipient_id;
            match self.grouping.apply(&self.pool, draft).await {
                Ok(outcome) => {
                    self.router.deliver(&outcome.notification).await;
                }
                Err(e) => {
                    tracing::error!(
                        kind = %event.kind,
                        recipient_id = %recipient_id,
                        error = %e,
                        "Failed to persist notification"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Parse the typed payload for an event, rejecting malformed input at
/// handler entry.
fn parse_payload<T: serde::de::DeserializeOwned>(event: &AppEvent) -> anyhow::Result<T> {
    serde_json::from_value(event.payload.clone())
        .map_err(|e| anyhow::anyhow!("Malformed {} payload: {}", event.kind, e))
}

/// Recipient resolution for events that need no store lookups.
fn build_direct_drafts(event: &AppEvent) -> anyhow::Result<Vec<NotificationDraft>> {
    let drafts = match event.kind {
        EventKind::NewComment => {
            let payload: NewCommentPayload = parse_payload(event)?;
            if payload.author_id == payload.video_owner_id {
                vec![]
            } else {
                vec![NotificationDraft {
                    recipient_id: payload.video_owner_id,
                    sender_id: Some(payload.author_id),
                    notification_type: NotificationType::Comment,
                    resource_type: ResourceType::Video,
                    resource_id: payload.video_id,
                    data: json!({
                        "video_id": payload.video_id,
                        "comment_id": payload.comment_id,
                        "actor_name": payload.author_name,
                    }),
                }]
            }
        }
        EventKind::NewLike => {
            let payload: NewLikePayload = parse_payload(event)?;
            if payload.liker_id == payload.video_owner_id {
                vec![]
            } else {
                vec![NotificationDraft {
                    recipient_id: payload.video_owner_id,
                    sender_id: Some(payload.liker_id),
                    notification_type: NotificationType::Like,
                    resource_type: ResourceType::Video,
                    resource_id: payload.video_id,
                    data: json!({
                        "video_id": payload.video_id,
                        "actor_name": payload.liker_name,
                    }),
                }]
            }
        }
        EventKind::NewSubscription => {
            let payload: NewSubscriptionPayload = parse_payload(event)?;
            if payload.subscriber_id == payload.channel_owner_id {
                vec![]
            } else {
                vec![NotificationDraft {
                    recipient_id: payload.channel_owner_id,
                    sender_id: Some(payload.subscriber_id),
                    notification_type: NotificationType::Subscription,
                    resource_type: ResourceType::User,
                    resource_id: payload.channel_owner_id,
                    data: json!({
                        "actor_name": payload.subscriber_name,
                    }),
                }]
            }
        }
        EventKind::VideoProcessed => {
            let payload: VideoProcessedPayload = parse_payload(event)?;
            vec![NotificationDraft {
                recipient_id: payload.owner_id,
                sender_id: None,
                notification_type: NotificationType::System,
                resource_type: ResourceType::Video,
                resource_id: payload.video_id,
                data: json!({
                    "video_id": payload.video_id,
                    "title": payload.title,
                    "status": payload.status,
                }),
            }]
        }
        EventKind::Mention => {
            let payload: MentionPayload = parse_payload(event)?;
            payload
                .mentioned_user_ids
                .iter()
                .filter(|mentioned| **mentioned != payload.author_id)
                .map(|mentioned| NotificationDraft {
                    recipient_id: *mentioned,
                    sender_id: Some(payload.author_id),
                    notification_type: NotificationType::Mention,
                    resource_type: ResourceType::Comment,
                    resource_id: payload.comment_id,
                    data: json!({
                        "video_id": payload.video_id,
                        "comment_id": payload.comment_id,
                        "actor_name": payload.author_name,
                    }),
                })
                .collect()
        }
        // Store-dependent kinds are resolved in `drafts_for`.
        EventKind::NewVideo => vec![],
    };

    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn make_event(kind: EventKind, payload: serde_json::Value) -> AppEvent {
        AppEvent::new(kind, payload)
    }

    #[test]
    fn test_comment_notifies_video_owner() {
        let owner = Uuid::new_v4();
        let author = Uuid::new_v4();
        let video = Uuid::new_v4();
        let event = make_event(
            EventKind::NewComment,
            json!({
                "video_id": video,
                "video_owner_id": owner,
                "author_id": author,
                "author_name": "Alice",
                "comment_id": Uuid::new_v4(),
            }),
        );

        let drafts = build_direct_drafts(&event).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient_id, owner);
        assert_eq!(drafts[0].sender_id, Some(author));
        assert_eq!(drafts[0].notification_type, NotificationType::Comment);
        assert_eq!(drafts[0].resource_id, video);
    }

    #[test]
    fn test_self_comment_suppressed() {
        let owner = Uuid::new_v4();
        let event = make_event(
            EventKind::NewComment,
            json!({
                "video_id": Uuid::new_v4(),
                "video_owner_id": owner,
                "author_id": owner,
                "author_name": "Alice",
                "comment_id": Uuid::new_v4(),
            }),
        );

        assert!(build_direct_drafts(&event).unwrap().is_empty());
    }

    #[test]
    fn test_self_like_suppressed() {
        let owner = Uuid::new_v4();
        let event = make_event(
            EventKind::NewLike,
            json!({
                "video_id": Uuid::new_v4(),
                "video_owner_id": owner,
                "liker_id": owner,
            }),
        );

        assert!(build_direct_drafts(&event).unwrap().is_empty());
    }

    #[test]
    fn test_mention_excludes_author_and_fans_out() {
        let author = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let event = make_event(
            EventKind::Mention,
            json!({
                "video_id": Uuid::new_v4(),
                "comment_id": Uuid::new_v4(),
                "author_id": author,
                "author_name": "Carol",
                "mentioned_user_ids": [a, author, b],
            }),
        );

        let drafts = build_direct_drafts(&event).unwrap();
        let recipients: Vec<Uuid> = drafts.iter().map(|d| d.recipient_id).collect();
        assert_eq!(recipients, vec![a, b]);
    }

    #[test]
    fn test_video_processed_is_system_notification() {
        let owner = Uuid::new_v4();
        let event = make_event(
            EventKind::VideoProcessed,
            json!({
                "video_id": Uuid::new_v4(),
                "owner_id": owner,
                "title": "My Trip",
                "status": "ready",
            }),
        );

        let drafts = build_direct_drafts(&event).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].sender_id, None);
        assert_eq!(drafts[0].notification_type, NotificationType::System);
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let event = make_event(EventKind::NewComment, json!({"video_id": "not-a-uuid"}));
        let err = build_direct_drafts(&event).unwrap_err();
        assert!(err.to_string().contains("Malformed NEW_COMMENT payload"));
    }
}
