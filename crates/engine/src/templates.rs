//! Message templates — render the human-readable notification text.
//!
//! Every grouped update re-renders the message with the new count, so the
//! row always reads as the latest state of the group ("3 new comments on
//! your video"), never as a stale single event.

use herald_common::types::NotificationType;

/// Display name of the acting user, as supplied by the producer.
fn actor(data: &serde_json::Value) -> &str {
    data.get("actor_name")
        .and_then(|v| v.as_str())
        .unwrap_or("Someone")
}

/// Render the message for a notification type at a given group count.
pub fn render(notification_type: NotificationType, count: i64, data: &serde_json::Value) -> String {
    match notification_type {
        NotificationType::Comment => {
            if count <= 1 {
                format!("{} commented on your video", actor(data))
            } else {
                format!("{} new comments on your video", count)
            }
        }
        NotificationType::Like => {
            if count <= 1 {
                format!("{} liked your video", actor(data))
            } else {
                format!("{} people liked your video", count)
            }
        }
        NotificationType::Subscription => {
            if count <= 1 {
                format!("{} subscribed to your channel", actor(data))
            } else {
                format!("{} new subscribers on your channel", count)
            }
        }
        NotificationType::VideoUpload => {
            let title = data.get("title").and_then(|v| v.as_str());
            match (count <= 1, title) {
                (true, Some(title)) => {
                    format!("{} uploaded a new video: {}", actor(data), title)
                }
                (true, None) => format!("{} uploaded a new video", actor(data)),
                (false, _) => format!("{} new videos from {}", count, actor(data)),
            }
        }
        NotificationType::Mention => {
            if count <= 1 {
                format!("{} mentioned you in a comment", actor(data))
            } else {
                format!("You were mentioned in {} comments", count)
            }
        }
        NotificationType::System => {
            let title = data.get("title").and_then(|v| v.as_str());
            let status = data
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("updated");
            match title {
                Some(title) => format!("Your video \"{}\" is {}", title, status),
                None => format!("Your video is {}", status),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_comment_names_actor() {
        let msg = render(
            NotificationType::Comment,
            1,
            &serde_json::json!({"actor_name": "Alice"}),
        );
        assert_eq!(msg, "Alice commented on your video");
    }

    #[test]
    fn test_grouped_likes_show_count() {
        let msg = render(NotificationType::Like, 3, &serde_json::json!({}));
        assert_eq!(msg, "3 people liked your video");
    }

    #[test]
    fn test_missing_actor_falls_back() {
        let msg = render(NotificationType::Subscription, 1, &serde_json::json!({}));
        assert_eq!(msg, "Someone subscribed to your channel");
    }

    #[test]
    fn test_video_upload_with_title() {
        let msg = render(
            NotificationType::VideoUpload,
            1,
            &serde_json::json!({"actor_name": "Bob", "title": "My Trip"}),
        );
        assert_eq!(msg, "Bob uploaded a new video: My Trip");
    }

    #[test]
    fn test_system_processing_status() {
        let msg = render(
            NotificationType::System,
            1,
            &serde_json::json!({"title": "My Trip", "status": "ready"}),
        );
        assert_eq!(msg, "Your video \"My Trip\" is ready");
    }

    #[test]
    fn test_grouped_mentions() {
        let msg = render(NotificationType::Mention, 2, &serde_json::json!({}));
        assert_eq!(msg, "You were mentioned in 2 comments");
    }
}
