//! Notification channel adapters.
//!
//! Each asynchronous delivery medium (email, push) implements
//! [`ChannelAdapter`]. Adapters are invoked by the delivery router, which
//! bounds every call with a timeout and records per-channel outcomes
//! independently — one channel failing never blocks another.

pub mod email;
pub mod push;

use async_trait::async_trait;
use thiserror::Error;

use herald_common::types::{Channel, Notification, User};

/// Error type for channel delivery failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport-level failure (connect, TLS, timeout at the HTTP layer).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The downstream service answered with a non-success status.
    #[error("Delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The recipient has no contact address for this channel.
    #[error("Missing contact for channel {0}")]
    MissingContact(Channel),
}

/// A delivery medium the router can dispatch to.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Attempt one delivery. The router bounds this call with a timeout;
    /// a timeout or error is a per-channel failure, never fatal.
    async fn send(&self, recipient: &User, notification: &Notification)
    -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_display_rejected() {
        let err = DeliveryError::Rejected {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Delivery rejected with status 503: unavailable"
        );
    }

    #[test]
    fn test_delivery_error_display_missing_contact() {
        let err = DeliveryError::MissingContact(Channel::Email);
        assert_eq!(err.to_string(), "Missing contact for channel email");
    }
}
