//! Push delivery via an external push-gateway webhook.
//!
//! The gateway owns device tokens and platform specifics; Herald posts it
//! a JSON envelope addressed by user id.

use async_trait::async_trait;
use serde_json::json;

use herald_common::types::{Channel, Notification, User};

use crate::{ChannelAdapter, DeliveryError};

/// Sends push notifications through a webhook gateway.
pub struct PushAdapter {
    client: reqwest::Client,
    gateway_url: String,
}

impl PushAdapter {
    pub fn new(gateway_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
        }
    }

    /// Envelope posted to the gateway.
    fn envelope(recipient: &User, notification: &Notification) -> serde_json::Value {
        json!({
            "user_id": recipient.id,
            "notification_id": notification.id,
            "title": notification.notification_type.to_string(),
            "body": notification.message,
            "data": notification.data,
        })
    }
}

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(
        &self,
        recipient: &User,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.gateway_url)
            .json(&Self::envelope(recipient, notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            notification_id = %notification.id,
            recipient_id = %recipient.id,
            "Push notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_common::types::{NotificationType, ResourceType};
    use uuid::Uuid;

    #[test]
    fn test_envelope_addresses_recipient() {
        let recipient = User {
            id: Uuid::new_v4(),
            username: "carol".to_string(),
            email: Some("carol@example.com".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: recipient.id,
            sender_id: None,
            notification_type: NotificationType::Like,
            resource_type: ResourceType::Video,
            resource_id: Uuid::new_v4(),
            message: "3 people liked your video".to_string(),
            is_read: false,
            delivery_status: serde_json::json!({}),
            data: serde_json::json!({"count": 3}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let envelope = PushAdapter::envelope(&recipient, &notification);
        assert_eq!(envelope["user_id"], serde_json::json!(recipient.id));
        assert_eq!(envelope["title"], "like");
        assert_eq!(envelope["body"], "3 people liked your video");
        assert_eq!(envelope["data"]["count"], 3);
    }
}
