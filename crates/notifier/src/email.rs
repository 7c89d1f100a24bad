//! Email delivery via the Resend HTTP API.

use async_trait::async_trait;
use serde_json::json;

use herald_common::types::{Channel, Notification, User};

use crate::{ChannelAdapter, DeliveryError};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Sends notification emails through Resend.
pub struct EmailAdapter {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl EmailAdapter {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
            endpoint: RESEND_ENDPOINT.to_string(),
        }
    }

    /// Override the API endpoint (used by tests against a local server).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Subject line for a notification email.
    fn subject(notification: &Notification) -> String {
        format!("[Herald] {}", notification.notification_type)
    }

    /// Request body for the Resend API.
    fn request_body(&self, to: &str, notification: &Notification) -> serde_json::Value {
        json!({
            "from": self.from,
            "to": [to],
            "subject": Self::subject(notification),
            "text": notification.message,
        })
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(
        &self,
        recipient: &User,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let to = recipient
            .email
            .as_deref()
            .ok_or(DeliveryError::MissingContact(Channel::Email))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(to, notification))
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
            "Notification email sent"
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

    fn make_notification() -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            sender_id: None,
            notification_type: NotificationType::Comment,
            resource_type: ResourceType::Video,
            resource_id: Uuid::new_v4(),
            message: "Alice commented on your video".to_string(),
            is_read: false,
            delivery_status: serde_json::json!({}),
            data: serde_json::json!({"count": 1}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_names_notification_type() {
        let n = make_notification();
        assert_eq!(EmailAdapter::subject(&n), "[Herald] comment");
    }

    #[test]
    fn test_request_body_shape() {
        let adapter = EmailAdapter::new("key".to_string(), "herald@example.com".to_string());
        let n = make_notification();
        let body = adapter.request_body("user@example.com", &n);

        assert_eq!(body["from"], "herald@example.com");
        assert_eq!(body["to"][0], "user@example.com");
        assert_eq!(body["text"], "Alice commented on your video");
    }

    #[tokio::test]
    async fn test_send_without_email_address_fails() {
        let adapter = EmailAdapter::new("key".to_string(), "herald@example.com".to_string());
        let recipient = User {
            id: Uuid::new_v4(),
            username: "bob".to_string(),
            email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let result = adapter.send(&recipient, &make_notification()).await;
        assert!(matches!(
            result,
            Err(DeliveryError::MissingContact(Channel::Email))
        ));
    }
}
