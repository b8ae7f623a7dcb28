//! Like service.

use crate::services::{
    event_publisher::{CounterKind, EventPublisherService},
    notification::NotificationService,
};
use campus_common::{AppResult, IdGenerator};
use campus_db::{
    entities::post_like,
    repositories::{PostLikeRepository, PostRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;

/// Like state after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub is_liked: bool,
    pub likes_count: i32,
}

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    like_repo: PostLikeRepository,
    post_repo: PostRepository,
    notifications: Option<NotificationService>,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub const fn new(like_repo: PostLikeRepository, post_repo: PostRepository) -> Self {
        Self {
            like_repo,
            post_repo,
            notifications: None,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the notification service.
    pub fn set_notification_service(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Like the post if the user hasn't, unlike it otherwise.
    ///
    /// The returned count is the count read before the toggle plus or minus
    /// one, not a re-read after commit.
    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> AppResult<LikeState> {
        let post = self.post_repo.get_visible(post_id, Some(user_id)).await?;

        let state = if let Some(existing) = self.like_repo.find(post_id, user_id).await? {
            self.like_repo.unlike(&existing).await?;
            LikeState {
                is_liked: false,
                likes_count: (post.likes_count - 1).max(0),
            }
        } else {
            let model = post_like::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(Utc::now().into()),
            };
            self.like_repo.like(model, post_id).await?;
            LikeState {
                is_liked: true,
                likes_count: post.likes_count + 1,
            }
        };

        if let Some(ref event_publisher) = self.event_publisher {
            let kind = if state.is_liked {
                CounterKind::Like
            } else {
                CounterKind::Unlike
            };
            if let Err(e) = event_publisher
                .publish_post_updated(post_id, kind, Some(state.likes_count), None, user_id)
                .await
            {
                tracing::warn!(error = %e, post_id = %post_id, "Failed to publish like event");
            }
        }

        if state.is_liked
            && post.author_id != user_id
            && let Some(notifications) = self.notifications.clone()
        {
            let post_id = post_id.to_string();
            let author_id = post.author_id.clone();
            let user_id = user_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = notifications
                    .notify_post_like(&post_id, &author_id, &user_id)
                    .await
                {
                    tracing::warn!(error = %e, post_id = %post_id, "Failed to notify post like");
                }
            });
        }

        Ok(state)
    }
}
