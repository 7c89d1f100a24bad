use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kinds of notifications the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Comment,
    Like,
    Subscription,
    VideoUpload,
    Mention,
    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Comment => write!(f, "comment"),
            NotificationType::Like => write!(f, "like"),
            NotificationType::Subscription => write!(f, "subscription"),
            NotificationType::VideoUpload => write!(f, "video_upload"),
            NotificationType::Mention => write!(f, "mention"),
            NotificationType::System => write!(f, "system"),
        }
    }
}

/// Kind of resource a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Video,
    Comment,
    User,
    System,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Video => write!(f, "video"),
            ResourceType::Comment => write!(f, "comment"),
            ResourceType::User => write!(f, "user"),
            ResourceType::System => write!(f, "system"),
        }
    }
}

/// A delivery medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    InApp,
    Email,
    Push,
    Sms,
}

impl Channel {
    /// Stable string form, also used as the JSONB key in `delivery_status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Push => "push",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery outcome for a single channel of a notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDelivery {
    pub delivered: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Typed view of a notification's `delivery_status` JSONB column.
///
/// Missing channels deserialize as "not delivered".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryState {
    #[serde(default)]
    pub in_app: ChannelDelivery,
    #[serde(default)]
    pub email: ChannelDelivery,
    #[serde(default)]
    pub push: ChannelDelivery,
}

impl DeliveryState {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelDelivery> {
        match channel {
            Channel::InApp => Some(&self.in_app),
            Channel::Email => Some(&self.email),
            Channel::Push => Some(&self.push),
            Channel::Sms => None,
        }
    }
}

/// A user in the system.
///
/// Account management lives in the external CRUD API; Herald reads this
/// table to resolve channel contact addresses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted notification.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    /// Absent for system notifications.
    pub sender_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub message: String,
    pub is_read: bool,
    pub delivery_status: serde_json::Value,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Typed view of the `delivery_status` column.
    pub fn delivery_state(&self) -> DeliveryState {
        serde_json::from_value(self.delivery_status.clone()).unwrap_or_default()
    }

    /// Grouped-event count; a row without an explicit count represents one event.
    pub fn count(&self) -> i64 {
        self.data.get("count").and_then(|v| v.as_i64()).unwrap_or(1)
    }
}

/// Per-channel overrides inside a [`TypeOverride`].
///
/// A missing field means "no override" — the channel is allowed at the
/// type level and only the master toggle applies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelOverrides {
    pub in_app: Option<bool>,
    pub email: Option<bool>,
    pub push: Option<bool>,
    pub sms: Option<bool>,
}

impl ChannelOverrides {
    fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app.unwrap_or(true),
            Channel::Email => self.email.unwrap_or(true),
            Channel::Push => self.push.unwrap_or(true),
            Channel::Sms => self.sms.unwrap_or(true),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Typed entry of the `type_overrides` JSONB map, keyed by notification type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeOverride {
    /// Type-level kill switch. Defaults to enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub channels: ChannelOverrides,
}

impl Default for TypeOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: ChannelOverrides::default(),
        }
    }
}

/// A user's notification preferences.
///
/// Row defaults match the lazy-creation defaults: every channel on except
/// SMS, every type enabled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Preference {
    pub user_id: Uuid,
    pub in_app: bool,
    pub email: bool,
    pub push: bool,
    pub sms: bool,
    pub type_overrides: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Preference {
    /// Master toggle for a channel.
    fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => self.in_app,
            Channel::Email => self.email,
            Channel::Push => self.push,
            Channel::Sms => self.sms,
        }
    }

    /// Effective permission for `(notification_type, channel)`:
    /// `type.enabled AND channel master AND type-level channel override`.
    ///
    /// Pure function of the row — no I/O.
    pub fn allows(&self, notification_type: NotificationType, channel: Channel) -> bool {
        let overrides: HashMap<String, TypeOverride> =
            serde_json::from_value(self.type_overrides.clone()).unwrap_or_default();
        let type_override = overrides
            .get(&notification_type.to_string())
            .cloned()
            .unwrap_or_default();

        type_override.enabled
            && self.channel_enabled(channel)
            && type_override.channels.allows(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_preference(type_overrides: serde_json::Value) -> Preference {
        Preference {
            user_id: Uuid::new_v4(),
            in_app: true,
            email: true,
            push: true,
            sms: false,
            type_overrides,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_defaults_allow_all_but_sms() {
        let pref = make_preference(serde_json::json!({}));
        assert!(pref.allows(NotificationType::Comment, Channel::InApp));
        assert!(pref.allows(NotificationType::Like, Channel::Email));
        assert!(pref.allows(NotificationType::Mention, Channel::Push));
        assert!(!pref.allows(NotificationType::Comment, Channel::Sms));
    }

    #[test]
    fn test_master_toggle_beats_type_override() {
        let mut pref = make_preference(serde_json::json!({
            "comment": {"enabled": true, "channels": {"email": true}}
        }));
        pref.email = false;
        assert!(
            !pref.allows(NotificationType::Comment, Channel::Email),
            "Disabled master channel must win over a type-level allow"
        );
    }

    #[test]
    fn test_type_disabled_blocks_every_channel() {
        let pref = make_preference(serde_json::json!({
            "like": {"enabled": false}
        }));
        assert!(!pref.allows(NotificationType::Like, Channel::InApp));
        assert!(!pref.allows(NotificationType::Like, Channel::Email));
        assert!(!pref.allows(NotificationType::Like, Channel::Push));
        // Other types unaffected
        assert!(pref.allows(NotificationType::Comment, Channel::InApp));
    }

    #[test]
    fn test_channel_override_blocks_single_channel() {
        let pref = make_preference(serde_json::json!({
            "comment": {"channels": {"email": false}}
        }));
        assert!(!pref.allows(NotificationType::Comment, Channel::Email));
        assert!(pref.allows(NotificationType::Comment, Channel::InApp));
        assert!(pref.allows(NotificationType::Comment, Channel::Push));
    }

    #[test]
    fn test_malformed_overrides_fall_back_to_defaults() {
        let pref = make_preference(serde_json::json!("not an object"));
        assert!(pref.allows(NotificationType::Comment, Channel::InApp));
    }

    #[test]
    fn test_delivery_state_defaults_from_empty_json() {
        let state: DeliveryState = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!state.in_app.delivered);
        assert!(!state.email.delivered);
        assert!(state.push.timestamp.is_none());
    }

    #[test]
    fn test_notification_count_defaults_to_one() {
        let n = Notification {
            id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            sender_id: None,
            notification_type: NotificationType::System,
            resource_type: ResourceType::System,
            resource_id: Uuid::new_v4(),
            message: "m".to_string(),
            is_read: false,
            delivery_status: serde_json::json!({}),
            data: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(n.count(), 1);
    }
}
