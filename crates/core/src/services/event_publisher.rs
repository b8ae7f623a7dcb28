//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time feed events.
//! The API crate implements it with an in-process broadcast channel that is
//! streamed to clients over SSE.

use async_trait::async_trait;
use campus_common::AppResult;
use serde::Serialize;
use std::sync::Arc;

/// What changed a post's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    Like,
    Unlike,
    Comment,
}

/// Event types for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum FeedEvent {
    /// A post's like or comment counter changed.
    PostUpdated {
        post_id: String,
        kind: CounterKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        likes_count: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        comments_count: Option<i32>,
        user_id: String,
    },
    /// A top-level comment was added to a post.
    CommentAdded {
        post_id: String,
        user_id: String,
        comment: serde_json::Value,
    },
    /// A new notification was created.
    Notification {
        id: String,
        user_id: String,
        notification_type: String,
        notifier_id: String,
        post_id: String,
    },
}

impl FeedEvent {
    /// Event name on the stream.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PostUpdated { .. } => "post:updated",
            Self::CommentAdded { .. } => "comment:added",
            Self::Notification { .. } => "notification",
        }
    }
}

/// Trait for publishing real-time events.
///
/// This allows the core services to publish events
/// without depending on the transport that delivers them.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a post counter change.
    async fn publish_post_updated(
        &self,
        post_id: &str,
        kind: CounterKind,
        likes_count: Option<i32>,
        comments_count: Option<i32>,
        user_id: &str,
    ) -> AppResult<()>;

    /// Publish a new top-level comment.
    async fn publish_comment_added(
        &self,
        post_id: &str,
        user_id: &str,
        comment: serde_json::Value,
    ) -> AppResult<()>;

    /// Publish a notification event.
    async fn publish_notification(
        &self,
        id: &str,
        user_id: &str,
        notification_type: &str,
        notifier_id: &str,
        post_id: &str,
    ) -> AppResult<()>;
}

/// A no-op implementation of EventPublisher for testing or when real-time events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_post_updated(
        &self,
        _post_id: &str,
        _kind: CounterKind,
        _likes_count: Option<i32>,
        _comments_count: Option<i32>,
        _user_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_comment_added(
        &self,
        _post_id: &str,
        _user_id: &str,
        _comment: serde_json::Value,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_notification(
        &self,
        _id: &str,
        _user_id: &str,
        _notification_type: &str,
        _notifier_id: &str,
        _post_id: &str,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Type alias for a shared event publisher.
pub type EventPublisherService = Arc<dyn EventPublisher>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_post_updated_payload() {
        let event = FeedEvent::PostUpdated {
            post_id: "p1".to_string(),
            kind: CounterKind::Like,
            likes_count: Some(3),
            comments_count: None,
            user_id: "u1".to_string(),
        };

        assert_eq!(event.name(), "post:updated");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["postId"], "p1");
        assert_eq!(value["kind"], "like");
        assert_eq!(value["likesCount"], 3);
        assert!(value.get("commentsCount").is_none());
    }

    #[test]
    fn test_event_names() {
        let added = FeedEvent::CommentAdded {
            post_id: "p1".to_string(),
            user_id: "u1".to_string(),
            comment: serde_json::json!({ "id": "c1" }),
        };
        assert_eq!(added.name(), "comment:added");

        let notification = FeedEvent::Notification {
            id: "n1".to_string(),
            user_id: "u2".to_string(),
            notification_type: "POST_LIKE".to_string(),
            notifier_id: "u1".to_string(),
            post_id: "p1".to_string(),
        };
        assert_eq!(notification.name(), "notification");
        assert_eq!(
            serde_json::to_value(&notification).unwrap()["notificationType"],
            "POST_LIKE"
        );
    }

    #[tokio::test]
    async fn test_noop_publisher() {
        let publisher: EventPublisherService = Arc::new(NoOpEventPublisher);
        assert!(
            publisher
                .publish_post_updated("p1", CounterKind::Unlike, Some(0), None, "u1")
                .await
                .is_ok()
        );
    }
}
