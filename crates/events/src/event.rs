//! Application events consumed by the notification pipeline.
//!
//! Events are immutable facts produced by the REST layer: produced once,
//! consumed by zero or more bus handlers, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event kinds accepted on the inbound event contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    NewSubscription,
    NewVideo,
    NewComment,
    NewLike,
    VideoProcessed,
    Mention,
}

impl EventKind {
    /// Every kind, in contract order. Used to register pipeline handlers.
    pub const ALL: [EventKind; 6] = [
        EventKind::NewSubscription,
        EventKind::NewVideo,
        EventKind::NewComment,
        EventKind::NewLike,
        EventKind::VideoProcessed,
        EventKind::Mention,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::NewSubscription => write!(f, "NEW_SUBSCRIPTION"),
            EventKind::NewVideo => write!(f, "NEW_VIDEO"),
            EventKind::NewComment => write!(f, "NEW_COMMENT"),
            EventKind::NewLike => write!(f, "NEW_LIKE"),
            EventKind::VideoProcessed => write!(f, "VIDEO_PROCESSED"),
            EventKind::Mention => write!(f, "MENTION"),
        }
    }
}

/// An immutable application event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AppEvent {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

/// Payload of `NEW_COMMENT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommentPayload {
    pub video_id: Uuid,
    pub video_owner_id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub comment_id: Uuid,
}

/// Payload of `NEW_LIKE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLikePayload {
    pub video_id: Uuid,
    pub video_owner_id: Uuid,
    pub liker_id: Uuid,
    pub liker_name: Option<String>,
}

/// Payload of `NEW_SUBSCRIPTION`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscriptionPayload {
    pub channel_owner_id: Uuid,
    pub subscriber_id: Uuid,
    pub subscriber_name: Option<String>,
}

/// Payload of `NEW_VIDEO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideoPayload {
    pub video_id: Uuid,
    pub uploader_id: Uuid,
    pub uploader_name: Option<String>,
    pub title: Option<String>,
}

/// Payload of `VIDEO_PROCESSED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProcessedPayload {
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub status: String,
}

/// Payload of `MENTION`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionPayload {
    pub video_id: Uuid,
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub mentioned_user_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_format_round_trip() {
        for kind in EventKind::ALL {
            let s = serde_json::to_string(&kind).unwrap();
            assert_eq!(s, format!("\"{}\"", kind));
            let back: EventKind = serde_json::from_str(&s).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<EventKind, _> = serde_json::from_str("\"NEW_DANCE\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_event_deserializes_inbound_contract() {
        let event: AppEvent = serde_json::from_value(serde_json::json!({
            "type": "NEW_COMMENT",
            "payload": {"video_id": Uuid::new_v4(), "x": 1},
            "occurred_at": Utc::now(),
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::NewComment);
        assert_eq!(event.payload["x"], 1);
    }

    #[test]
    fn test_malformed_payload_fails_typed_parse() {
        let payload = serde_json::json!({"video_id": "not-a-uuid"});
        let result: Result<NewCommentPayload, _> = serde_json::from_value(payload);
        assert!(result.is_err());
    }
}
