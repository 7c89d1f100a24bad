//! Process-local connection registry.
//!
//! Maps connection ids to the authenticated user and an outbound message
//! channel. Owned exclusively by the fanout layer; mutated only through
//! connect/disconnect, never persisted. Cross-process visibility exists
//! only through the backplane.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Channel sender half for pushing serialized wire messages to a connection.
pub type ConnectionSender = mpsc::UnboundedSender<String>;

/// Metadata for a single live connection.
pub struct ConnectionEntry {
    /// Verified identity of the connected user.
    pub user_id: Uuid,
    /// Outbound message channel for this connection.
    pub sender: ConnectionSender,
    /// When this connection was established.
    pub connected_at: DateTime<Utc>,
}

/// All live connections of this process.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application. A user may hold any number of
/// simultaneous connections (multiple devices/tabs).
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection for a verified user.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the socket sink.
    pub async fn add(&self, conn_id: Uuid, user_id: Uuid) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let entry = ConnectionEntry {
            user_id,
            sender: tx,
            connected_at: Utc::now(),
        };
        self.connections.write().await.insert(conn_id, entry);
        rx
    }

    /// Deregister a connection. Idempotent — removing an unknown id is a no-op.
    pub async fn remove(&self, conn_id: Uuid) {
        self.connections.write().await.remove(&conn_id);
    }

    /// Send a serialized message to every live connection of a user.
    ///
    /// Returns the number of connections the message was sent to; zero
    /// (user offline on this process) is a normal outcome. Connections
    /// whose channels are closed are skipped — they are cleaned up by
    /// their own receive loop.
    pub async fn send_to_user(&self, user_id: Uuid, payload: &str) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for entry in conns.values() {
            if entry.user_id == user_id && entry.sender.send(payload.to_string()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Number of live connections on this process.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Drop every connection channel, prompting socket loops to close.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        conns.clear();
        tracing::info!(count, "Closed all real-time connections");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_multi_device_delivery() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let mut rx1 = registry.add(Uuid::new_v4(), user).await;
        let mut rx2 = registry.add(Uuid::new_v4(), user).await;

        let sent = registry.send_to_user(user, "hello").await;
        assert_eq!(sent, 2);
        assert_eq!(rx1.recv().await.unwrap(), "hello");
        assert_eq!(rx2.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_other_users_receive_nothing() {
        let registry = ConnectionRegistry::new();
        let target = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        registry.add(Uuid::new_v4(), target).await;
        let mut bystander_rx = registry.add(Uuid::new_v4(), bystander).await;

        registry.send_to_user(target, "private").await;
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_to_offline_user_is_zero() {
        let registry = ConnectionRegistry::new();
        let sent = registry.send_to_user(Uuid::new_v4(), "anyone?").await;
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        registry.add(conn, Uuid::new_v4()).await;
        registry.remove(conn).await;
        registry.remove(conn).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_closed_channel_not_counted() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let rx = registry.add(Uuid::new_v4(), user).await;
        drop(rx);

        let sent = registry.send_to_user(user, "gone").await;
        assert_eq!(sent, 0);
    }
}
