//! Delivery router — dispatches a persisted notification to its permitted
//! channels and records per-channel outcomes.
//!
//! Channels are independent: one channel failing, timing out, or being
//! suppressed never blocks or rolls back another. The real-time in-app
//! path is best-effort (durability is the store's job); asynchronous
//! channels are bounded by a timeout and record delivery status on
//! success only — retries belong to an external collaborator.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use herald_common::types::{Channel, Notification, NotificationType, User};
use herald_fanout::{Fanout, WireMessage};
use herald_notifier::ChannelAdapter;

use crate::preferences::PreferenceService;
use crate::store::NotificationStore;

/// Outcome of routing one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutcome {
    /// Sent and recorded in `delivery_status`.
    Delivered,
    /// Real-time push handed to the fanout layer; whether any connection
    /// was live is not observed here — offline recipients catch up via
    /// the feed.
    Published,
    /// Preferences deny this channel (or the resolver failed closed).
    Suppressed,
    /// The adapter call exceeded the delivery timeout.
    TimedOut,
    /// The adapter reported an error.
    Failed(String),
}

/// Per-channel outcomes for one notification.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<(Channel, ChannelOutcome)>,
}

impl DeliveryReport {
    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, o)| o)
    }
}

/// Routes notifications to the fanout layer and channel adapters.
pub struct DeliveryRouter {
    pool: PgPool,
    fanout: Arc<Fanout>,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    timeout: Duration,
}

impl DeliveryRouter {
    pub fn new(pool: PgPool, fanout: Arc<Fanout>, timeout: Duration) -> Self {
        Self {
            pool,
            fanout,
            adapters: Vec::new(),
            timeout,
        }
    }

    /// Register an asynchronous channel adapter (email, push).
    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Preference check that fails closed: a resolver error denies delivery.
    async fn permitted(
        &self,
        recipient_id: uuid::Uuid,
        notification_type: NotificationType,
        channel: Channel,
    ) -> bool {
        match PreferenceService::resolve(&self.pool, recipient_id, notification_type, channel).await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    recipient_id = %recipient_id,
                    channel = %channel,
                    error = %e,
                    "Preference resolution failed, failing closed"
                );
                false
            }
        }
    }

    /// Dispatch a notification to every permitted channel.
    pub async fn deliver(&self, notification: &Notification) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        // Real-time in-app path.
        let in_app = if self
            .permitted(
                notification.recipient_id,
                notification.notification_type,
                Channel::InApp,
            )
            .await
        {
            self.fanout
                .publish_to_user(
                    notification.recipient_id,
                    &WireMessage::Notification(notification.clone()),
                )
                .await;
            ChannelOutcome::Published
        } else {
            ChannelOutcome::Suppressed
        };
        report.outcomes.push((Channel::InApp, in_app));

        // Asynchronous channels, independently. Contact resolution happens
        // once; a failed lookup fails those channels, not the whole delivery.
        let recipient: Option<User> = if self.adapters.is_empty() {
            None
        } else {
            match NotificationStore::get_user(&self.pool, notification.recipient_id).await {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification.id,
                        error = %e,
                        "Recipient lookup failed"
                    );
                    None
                }
            }
        };

        for adapter in &self.adapters {
            let channel = adapter.channel();
            let outcome = if !self
                .permitted(
                    notification.recipient_id,
                    notification.notification_type,
                    channel,
                )
                .await
            {
                ChannelOutcome::Suppressed
            } else {
                match &recipient {
                    Some(user) => self.send_via(adapter.as_ref(), user, notification).await,
                    None => ChannelOutcome::Failed("recipient lookup failed".to_string()),
                }
            };
            report.outcomes.push((channel, outcome));
        }

        report
    }

    /// One bounded adapter call, recording delivery status on success.
    async fn send_via(
        &self,
        adapter: &dyn ChannelAdapter,
        recipient: &User,
        notification: &Notification,
    ) -> ChannelOutcome {
        let channel = adapter.channel();
        match tokio::time::timeout(self.timeout, adapter.send(recipient, notification)).await {
            Ok(Ok(())) => {
                if let Err(e) =
                    NotificationStore::record_channel_delivery(&self.pool, notification.id, channel)
                        .await
                {
                    tracing::warn!(
                        notification_id = %notification.id,
                        channel = %channel,
                        error = %e,
                        "Delivered but status not recorded"
                    );
                }
                ChannelOutcome::Delivered
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    channel = %channel,
                    error = %e,
                    "Channel delivery failed"
                );
                ChannelOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    channel = %channel,
                    timeout_secs = self.timeout.as_secs(),
                    "Channel delivery timed out"
                );
                ChannelOutcome::TimedOut
            }
        }
    }
}
