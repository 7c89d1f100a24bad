//! Messages sent to connected clients over the real-time channel.

use serde::{Deserialize, Serialize};

use herald_common::types::Notification;

/// A real-time wire message, serialized as `{"type": .., "data": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    /// A freshly delivered notification.
    Notification(Notification),
    /// Sent once after a connection is registered.
    ConnectionSuccessful { message: String },
}

impl WireMessage {
    /// Greeting sent right after registration.
    pub fn connection_successful() -> Self {
        WireMessage::ConnectionSuccessful {
            message: "Real-time notifications connected".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_common::types::{NotificationType, ResourceType};
    use uuid::Uuid;

    #[test]
    fn test_connection_successful_shape() {
        let json = serde_json::to_value(WireMessage::connection_successful()).unwrap();
        assert_eq!(json["type"], "connection_successful");
        assert!(json["data"]["message"].is_string());
    }

    #[test]
    fn test_notification_shape() {
        let n = Notification {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            sender_id: None,
            notification_type: NotificationType::Comment,
            resource_type: ResourceType::Video,
            resource_id: Uuid::new_v4(),
            message: "m".to_string(),
            is_read: false,
            delivery_status: serde_json::json!({}),
            data: serde_json::json!({"count": 1}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(WireMessage::Notification(n.clone())).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["data"]["id"], serde_json::json!(n.id));
        assert_eq!(json["data"]["notification_type"], "comment");
    }
}
