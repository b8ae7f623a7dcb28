//! Notification service.

use crate::services::event_publisher::EventPublisherService;
use campus_common::{AppResult, IdGenerator};
use campus_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use chrono::Utc;
use sea_orm::Set;

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Tell a post's author that someone liked it.
    pub async fn notify_post_like(
        &self,
        post_id: &str,
        post_author_id: &str,
        liker_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        self.create(
            post_author_id,
            liker_id,
            NotificationType::PostLike,
            post_id,
            None,
        )
        .await
    }

    /// Tell a post's author about a new top-level comment.
    pub async fn notify_post_comment(
        &self,
        post_id: &str,
        post_author_id: &str,
        commenter_id: &str,
        comment_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        self.create(
            post_author_id,
            commenter_id,
            NotificationType::PostComment,
            post_id,
            Some(comment_id),
        )
        .await
    }

    /// Tell a comment's author about a reply.
    pub async fn notify_comment_reply(
        &self,
        post_id: &str,
        parent_author_id: &str,
        replier_id: &str,
        comment_id: &str,
    ) -> AppResult<Option<notification::Model>> {
        self.create(
            parent_author_id,
            replier_id,
            NotificationType::CommentReply,
            post_id,
            Some(comment_id),
        )
        .await
    }

    /// A user's notifications, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        limit: Option<u64>,
        until_id: Option<&str>,
    ) -> AppResult<Vec<notification::Model>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self.notification_repo
            .find_by_notifiee(user_id, limit, until_id)
            .await
    }

    /// Mark all of a user's notifications as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Insert a notification unless the actor is notifying themselves.
    async fn create(
        &self,
        notifiee_id: &str,
        notifier_id: &str,
        notification_type: NotificationType,
        post_id: &str,
        comment_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        if notifiee_id == notifier_id {
            return Ok(None);
        }

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            notifiee_id: Set(notifiee_id.to_string()),
            notifier_id: Set(notifier_id.to_string()),
            notification_type: Set(notification_type.clone()),
            post_id: Set(post_id.to_string()),
            comment_id: Set(comment_id.map(ToString::to_string)),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        };

        let created = self.notification_repo.create(model).await?;

        if let Some(ref event_publisher) = self.event_publisher {
            let type_name = match notification_type {
                NotificationType::PostLike => "POST_LIKE",
                NotificationType::PostComment => "POST_COMMENT",
                NotificationType::CommentReply => "COMMENT_REPLY",
            };
            if let Err(e) = event_publisher
                .publish_notification(&created.id, notifiee_id, type_name, notifier_id, post_id)
                .await
            {
                tracing::warn!(error = %e, "Failed to publish notification event");
            }
        }

        Ok(Some(created))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_notification(id: &str, notifiee: &str, notifier: &str) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            notifiee_id: notifiee.to_string(),
            notifier_id: notifier.to_string(),
            notification_type: NotificationType::PostLike,
            post_id: "post1".to_string(),
            comment_id: None,
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_self_notification_skipped() {
        // Nothing queued: an insert would fail.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = NotificationService::new(NotificationRepository::new(db));

        let result = service.notify_post_like("post1", "user1", "user1").await;
        assert!(result.unwrap().is_none());

        let result = service
            .notify_comment_reply("post1", "user1", "user1", "c1")
            .await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_notify_post_like_creates_row() {
        let created = create_test_notification("n1", "author", "liker");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[created]])
                .into_connection(),
        );
        let service = NotificationService::new(NotificationRepository::new(db));

        let result = service
            .notify_post_like("post1", "author", "liker")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.notifiee_id, "author");
        assert_eq!(result.notification_type, NotificationType::PostLike);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 4,
                }])
                .into_connection(),
        );
        let service = NotificationService::new(NotificationRepository::new(db));

        assert_eq!(service.mark_all_read("user1").await.unwrap(), 4);
    }
}
