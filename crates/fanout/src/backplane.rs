//! Redis pub/sub backplane.
//!
//! Every process subscribes to `herald:user:*`; publishing to a user's
//! channel reaches whichever processes hold live connections for that
//! user, including the publishing process itself (local delivery rides
//! the same subscription, so nothing is delivered twice).
//!
//! Backplane loss degrades the layer to local-process delivery: publishes
//! fall back to the local registry and the health flag flips, surfaced by
//! the health endpoint. Persistence is unaffected.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::registry::ConnectionRegistry;
use crate::wire::WireMessage;

/// Prefix of per-user backplane channels.
const USER_CHANNEL_PREFIX: &str = "herald:user:";

/// Initial reconnect delay for the subscriber loop.
const RECONNECT_MIN: Duration = Duration::from_secs(1);

/// Maximum reconnect delay for the subscriber loop.
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Backplane channel name for a user.
fn user_channel(user_id: Uuid) -> String {
    format!("{USER_CHANNEL_PREFIX}{user_id}")
}

/// Extract the user id from a backplane channel name.
fn parse_user_channel(channel: &str) -> Option<Uuid> {
    channel
        .strip_prefix(USER_CHANNEL_PREFIX)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Cross-process real-time fanout.
pub struct Fanout {
    registry: Arc<ConnectionRegistry>,
    publisher: ConnectionManager,
    backplane_healthy: AtomicBool,
}

impl Fanout {
    pub fn new(registry: Arc<ConnectionRegistry>, publisher: ConnectionManager) -> Self {
        Self {
            registry,
            publisher,
            backplane_healthy: AtomicBool::new(false),
        }
    }

    /// The process-local connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Whether the backplane subscription is currently established.
    ///
    /// `false` means real-time delivery is degraded to connections held by
    /// this process only.
    pub fn backplane_healthy(&self) -> bool {
        self.backplane_healthy.load(Ordering::Relaxed)
    }

    /// Broadcast a wire message to every live connection of a user,
    /// across all processes.
    ///
    /// Fire-and-forget, at-most-once: returns once the backplane accepted
    /// the publish (or the local fallback ran), never waits for client
    /// acknowledgment. Zero reachable connections is a normal outcome.
    pub async fn publish_to_user(&self, user_id: Uuid, message: &WireMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize wire message");
                return;
            }
        };

        let mut conn = self.publisher.clone();
        let result: redis::RedisResult<i64> = redis::cmd("PUBLISH")
            .arg(user_channel(user_id))
            .arg(&payload)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(receivers) => {
                tracing::debug!(user_id = %user_id, receivers, "Published to backplane");
            }
            Err(e) => {
                // Degraded mode: the local process can still deliver to
                // its own connections.
                self.backplane_healthy.store(false, Ordering::Relaxed);
                let delivered = self.registry.send_to_user(user_id, &payload).await;
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    delivered,
                    "Backplane publish failed, delivered to local connections only"
                );
            }
        }
    }

    /// Run the backplane subscriber loop. Never returns; reconnects with
    /// exponential backoff on failure, flipping the health flag.
    pub async fn run_subscriber(self: Arc<Self>, redis_url: String) {
        let mut delay = RECONNECT_MIN;
        loop {
            match self.subscribe_once(&redis_url).await {
                Ok(()) => {
                    // Stream ended — connection lost after a healthy run.
                    delay = RECONNECT_MIN;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Backplane subscription failed");
                    delay = (delay * 2).min(RECONNECT_MAX);
                }
            }
            self.backplane_healthy.store(false, Ordering::Relaxed);
            tracing::warn!(
                retry_in_secs = delay.as_secs(),
                "Real-time delivery degraded to local process, reconnecting"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Establish one subscription and pump messages until the stream ends.
    async fn subscribe_once(&self, redis_url: &str) -> anyhow::Result<()> {
        let client = redis::Client::open(redis_url)?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.psubscribe(format!("{USER_CHANNEL_PREFIX}*")).await?;

        self.backplane_healthy.store(true, Ordering::Relaxed);
        tracing::info!("Backplane subscription established");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let Some(user_id) = parse_user_channel(msg.get_channel_name()) else {
                tracing::warn!(channel = msg.get_channel_name(), "Unroutable backplane message");
                continue;
            };
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "Undecodable backplane payload");
                    continue;
                }
            };
            let delivered = self.registry.send_to_user(user_id, &payload).await;
            if delivered > 0 {
                tracing::debug!(user_id = %user_id, delivered, "Delivered to local connections");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_channel_round_trip() {
        let user = Uuid::new_v4();
        let channel = user_channel(user);
        assert_eq!(parse_user_channel(&channel), Some(user));
    }

    #[test]
    fn test_foreign_channel_not_routed() {
        assert_eq!(parse_user_channel("herald:other:abc"), None);
        assert_eq!(parse_user_channel("herald:user:not-a-uuid"), None);
    }
}
