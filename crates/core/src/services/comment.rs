//! Comment service.
//!
//! Comments thread one level deep on the read path: a page of top-level
//! comments each embeds its first few replies, and deeper pages come from
//! [`CommentService::list_replies`]. Reaction counts are never stored on the
//! comment; they are aggregated per read.

use std::collections::HashMap;

use crate::services::{
    event_publisher::{CounterKind, EventPublisherService},
    notification::NotificationService,
    pagination::{PageRequest, Paginated},
    user::{AuthorInfo, UserService},
};
use campus_common::{AppError, AppResult, IdGenerator};
use campus_db::{
    entities::{
        comment,
        comment_reaction::{self, ReactionType},
        user,
    },
    repositories::{CommentReactionRepository, CommentRepository, PostRepository, ReactionTally},
};
use chrono::Utc;
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LENGTH: usize = 500;

/// Replies embedded under each top-level comment.
pub const REPLY_PREVIEW_COUNT: u64 = 3;

pub const DEFAULT_COMMENT_LIMIT: u64 = 20;
pub const MAX_COMMENT_LIMIT: u64 = 50;

/// Ordering of top-level comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    /// Newest first.
    #[default]
    New,
    /// Oldest first.
    Old,
    /// Most reactions first, within the fetched page.
    Top,
}

/// Per-type reaction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounts {
    #[serde(rename = "LIKE")]
    pub like: i64,
    #[serde(rename = "LOVE")]
    pub love: i64,
    #[serde(rename = "HELPFUL")]
    pub helpful: i64,
    #[serde(rename = "INSIGHTFUL")]
    pub insightful: i64,
}

impl ReactionCounts {
    pub fn add(&mut self, reaction_type: ReactionType, count: i64) {
        match reaction_type {
            ReactionType::Like => self.like += count,
            ReactionType::Love => self.love += count,
            ReactionType::Helpful => self.helpful += count,
            ReactionType::Insightful => self.insightful += count,
        }
    }

    #[must_use]
    pub const fn total(&self) -> i64 {
        self.like + self.love + self.helpful + self.insightful
    }
}

/// A comment as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub author: Option<AuthorInfo>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub is_edited: bool,
    /// True number of direct replies, even when fewer are embedded.
    pub replies_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentResponse>>,
    /// The caller's own reaction, if any.
    pub user_reaction: Option<ReactionType>,
    pub reactions: ReactionCounts,
}

/// Whether a reaction toggle added or removed the reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Added,
    Removed,
}

/// Reaction state of a comment after a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionToggleResult {
    pub action: ReactionAction,
    pub reaction_type: ReactionType,
    pub reactions: ReactionCounts,
    /// Every reaction the caller now holds on the comment.
    pub user_reactions: Vec<ReactionType>,
}

/// Lookups needed to render a batch of comments.
#[derive(Debug, Default)]
pub struct CommentContext {
    pub reply_counts: HashMap<String, i64>,
    pub reactions: HashMap<String, ReactionCounts>,
    pub user_reactions: HashMap<String, ReactionType>,
    pub authors: HashMap<String, AuthorInfo>,
}

impl CommentContext {
    /// Fold grouped tally rows into per-comment counts.
    #[must_use]
    pub fn reactions_from_tallies(tallies: &[ReactionTally]) -> HashMap<String, ReactionCounts> {
        let mut reactions: HashMap<String, ReactionCounts> = HashMap::new();
        for tally in tallies {
            reactions
                .entry(tally.comment_id.clone())
                .or_default()
                .add(tally.reaction_type, tally.count);
        }
        reactions
    }

    /// First reaction per comment from rows ordered oldest first.
    #[must_use]
    pub fn first_reactions(rows: &[comment_reaction::Model]) -> HashMap<String, ReactionType> {
        let mut first = HashMap::new();
        for row in rows {
            first
                .entry(row.comment_id.clone())
                .or_insert(row.reaction_type);
        }
        first
    }

    #[must_use]
    pub fn response(
        &self,
        model: &comment::Model,
        replies: Option<Vec<CommentResponse>>,
    ) -> CommentResponse {
        CommentResponse {
            id: model.id.clone(),
            post_id: model.post_id.clone(),
            parent_id: model.parent_id.clone(),
            content: model.content.clone(),
            author: self.authors.get(&model.author_id).cloned(),
            created_at: model.created_at,
            updated_at: model.updated_at,
            is_edited: model.is_edited(),
            replies_count: self.reply_counts.get(&model.id).copied().unwrap_or(0),
            replies,
            user_reaction: self.user_reactions.get(&model.id).copied(),
            reactions: self.reactions.get(&model.id).copied().unwrap_or_default(),
        }
    }

    /// Render top-level comments with their embedded reply previews.
    #[must_use]
    pub fn threads(
        &self,
        comments: &[comment::Model],
        previews: &[comment::Model],
    ) -> Vec<CommentResponse> {
        let mut by_parent: HashMap<&str, Vec<CommentResponse>> = HashMap::new();
        for reply in previews {
            if let Some(parent_id) = reply.parent_id.as_deref() {
                by_parent
                    .entry(parent_id)
                    .or_default()
                    .push(self.response(reply, None));
            }
        }

        comments
            .iter()
            .map(|c| {
                let replies = by_parent.remove(c.id.as_str()).unwrap_or_default();
                self.response(c, Some(replies))
            })
            .collect()
    }
}

/// Stable sort by total reactions, most first.
pub fn sort_by_reactions(comments: &mut [CommentResponse]) {
    comments.sort_by_key(|c| std::cmp::Reverse(c.reactions.total()));
}

/// Trim and bound comment content.
fn validate_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment content is required".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Comment must be at most {MAX_COMMENT_LENGTH} characters"
        )));
    }
    Ok(content.to_string())
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    reaction_repo: CommentReactionRepository,
    post_repo: PostRepository,
    users: UserService,
    notifications: Option<NotificationService>,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        reaction_repo: CommentReactionRepository,
        post_repo: PostRepository,
        users: UserService,
    ) -> Self {
        Self {
            comment_repo,
            reaction_repo,
            post_repo,
            users,
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

    /// Add a comment or, with `parent_id`, a reply.
    pub async fn add(
        &self,
        post_id: &str,
        author: &user::Model,
        content: &str,
        parent_id: Option<&str>,
    ) -> AppResult<CommentResponse> {
        let content = validate_content(content)?;
        let post = self.post_repo.get_visible(post_id, Some(author.id.as_str())).await?;

        let parent = match parent_id {
            Some(parent_id) => {
                let parent = self.comment_repo.get_by_id(parent_id).await?;
                if parent.post_id != post.id {
                    return Err(AppError::BadRequest(
                        "Parent comment belongs to a different post".to_string(),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let now = Utc::now();
        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id.clone()),
            author_id: Set(author.id.clone()),
            parent_id: Set(parent.as_ref().map(|p| p.id.clone())),
            content: Set(content),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = self.comment_repo.create(model, &post.id).await?;

        let mut context = CommentContext::default();
        context
            .authors
            .insert(author.id.clone(), AuthorInfo::from(author));
        let replies = parent.is_none().then(Vec::new);
        let response = context.response(&created, replies);

        if let Some(parent) = parent {
            self.spawn_notification(
                NotifyKind::Reply,
                &post.id,
                &parent.author_id,
                &author.id,
                &created.id,
            );
        } else {
            self.spawn_notification(
                NotifyKind::PostComment,
                &post.id,
                &post.author_id,
                &author.id,
                &created.id,
            );

            if let Some(ref event_publisher) = self.event_publisher {
                if let Err(e) = event_publisher
                    .publish_post_updated(
                        &post.id,
                        CounterKind::Comment,
                        None,
                        Some(post.comments_count + 1),
                        &author.id,
                    )
                    .await
                {
                    tracing::warn!(error = %e, post_id = %post.id, "Failed to publish post update");
                }

                match serde_json::to_value(&response) {
                    Ok(payload) => {
                        if let Err(e) = event_publisher
                            .publish_comment_added(&post.id, &author.id, payload)
                            .await
                        {
                            tracing::warn!(error = %e, post_id = %post.id, "Failed to publish comment");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to encode comment event"),
                }
            }
        }

        Ok(response)
    }

    /// A page of top-level comments with reply previews and reaction tallies.
    pub async fn list(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
        request: PageRequest,
        sort: CommentSort,
    ) -> AppResult<Paginated<CommentResponse>> {
        let post = self.post_repo.get_visible(post_id, viewer_id).await?;

        let comments = self
            .comment_repo
            .find_top_level(
                &post.id,
                sort == CommentSort::Old,
                request.offset(),
                request.limit,
            )
            .await?;
        let total = self.comment_repo.count_top_level(&post.id).await?;

        let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let previews = self
            .comment_repo
            .find_reply_previews(&ids, REPLY_PREVIEW_COUNT)
            .await?;

        let all: Vec<comment::Model> = comments.iter().chain(previews.iter()).cloned().collect();
        let context = self.context(&all, viewer_id).await?;

        let mut items = context.threads(&comments, &previews);
        if sort == CommentSort::Top {
            sort_by_reactions(&mut items);
        }

        Ok(Paginated::new(items, request, total))
    }

    /// A page of direct replies to a comment, oldest first.
    pub async fn list_replies(
        &self,
        comment_id: &str,
        viewer_id: Option<&str>,
        request: PageRequest,
    ) -> AppResult<Paginated<CommentResponse>> {
        let parent = self.visible_comment(comment_id, viewer_id).await?;

        let replies = self
            .comment_repo
            .find_replies(&parent.id, request.offset(), request.limit)
            .await?;
        let total = self
            .comment_repo
            .count_replies(std::slice::from_ref(&parent.id))
            .await?
            .get(&parent.id)
            .copied()
            .unwrap_or(0);

        let context = self.context(&replies, viewer_id).await?;
        let items = replies.iter().map(|r| context.response(r, None)).collect();

        Ok(Paginated::new(items, request, total.max(0) as u64))
    }

    /// Edit a comment's content. Only its author may.
    pub async fn edit(
        &self,
        comment_id: &str,
        actor_id: &str,
        content: &str,
    ) -> AppResult<CommentResponse> {
        let content = validate_content(content)?;
        let existing = self.comment_repo.get_by_id(comment_id).await?;

        if existing.author_id != actor_id {
            return Err(AppError::Forbidden(
                "You can only edit your own comments".to_string(),
            ));
        }

        let model = comment::ActiveModel {
            id: Set(existing.id.clone()),
            content: Set(content),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let updated = self.comment_repo.update(model).await?;

        let context = self.context(std::slice::from_ref(&updated), Some(actor_id)).await?;
        Ok(context.response(&updated, None))
    }

    /// Delete a comment and its replies.
    ///
    /// Allowed for the comment's author, the post's author and admins.
    /// Returns the number of removed comments.
    pub async fn delete(&self, comment_id: &str, actor: &user::Model) -> AppResult<u64> {
        let existing = self.comment_repo.get_by_id(comment_id).await?;
        let post = self.post_repo.get_by_id(&existing.post_id).await?;

        let allowed =
            existing.author_id == actor.id || post.author_id == actor.id || actor.is_admin();
        if !allowed {
            return Err(AppError::Forbidden(
                "You cannot delete this comment".to_string(),
            ));
        }

        let removed = self.comment_repo.delete(&existing).await?;
        tracing::info!(comment_id = %existing.id, removed = removed, "Deleted comment");

        if let Some(ref event_publisher) = self.event_publisher {
            let comments_count = (i64::from(post.comments_count) - removed as i64).max(0) as i32;
            if let Err(e) = event_publisher
                .publish_post_updated(
                    &post.id,
                    CounterKind::Comment,
                    None,
                    Some(comments_count),
                    &actor.id,
                )
                .await
            {
                tracing::warn!(error = %e, post_id = %post.id, "Failed to publish post update");
            }
        }

        Ok(removed)
    }

    /// Toggle one reaction type on a comment.
    ///
    /// Types are independent: holding LIKE does not stop a user adding LOVE.
    pub async fn toggle_reaction(
        &self,
        comment_id: &str,
        user_id: &str,
        reaction_type: &str,
    ) -> AppResult<ReactionToggleResult> {
        let reaction_type = ReactionType::parse(reaction_type)
            .ok_or_else(|| AppError::BadRequest("Invalid reaction type".to_string()))?;
        let target = self.visible_comment(comment_id, Some(user_id)).await?;

        let action = if let Some(existing) = self
            .reaction_repo
            .find(&target.id, user_id, reaction_type)
            .await?
        {
            self.reaction_repo.delete(&existing.id).await?;
            ReactionAction::Removed
        } else {
            let model = comment_reaction::ActiveModel {
                id: Set(self.id_gen.generate()),
                comment_id: Set(target.id.clone()),
                user_id: Set(user_id.to_string()),
                reaction_type: Set(reaction_type),
                created_at: Set(Utc::now().into()),
            };
            self.reaction_repo.create(model).await?;
            ReactionAction::Added
        };

        let ids = std::slice::from_ref(&target.id);
        let tallies = self.reaction_repo.tally(ids).await?;
        let user_reactions = self
            .reaction_repo
            .find_by_user(user_id, ids)
            .await?
            .into_iter()
            .map(|r| r.reaction_type)
            .collect();

        Ok(ReactionToggleResult {
            action,
            reaction_type,
            reactions: CommentContext::reactions_from_tallies(&tallies)
                .remove(&target.id)
                .unwrap_or_default(),
            user_reactions,
        })
    }

    /// A comment whose post `viewer_id` may see. Comments under other
    /// authors' private posts are reported as missing.
    async fn visible_comment(
        &self,
        comment_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<comment::Model> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        match self.post_repo.get_visible(&comment.post_id, viewer_id).await {
            Ok(_) => Ok(comment),
            Err(AppError::PostNotFound(_)) => Err(AppError::CommentNotFound(comment_id.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Gather reply counts, reactions and authors for a batch of comments.
    async fn context(
        &self,
        comments: &[comment::Model],
        viewer_id: Option<&str>,
    ) -> AppResult<CommentContext> {
        let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();

        let reply_counts = self.comment_repo.count_replies(&ids).await?;
        let tallies = self.reaction_repo.tally(&ids).await?;
        let user_reactions = match viewer_id {
            Some(viewer_id) => {
                let rows = self.reaction_repo.find_by_user(viewer_id, &ids).await?;
                CommentContext::first_reactions(&rows)
            }
            None => HashMap::new(),
        };
        let authors = self.users.authors(&author_ids).await?;

        Ok(CommentContext {
            reply_counts,
            reactions: CommentContext::reactions_from_tallies(&tallies),
            user_reactions,
            authors,
        })
    }

    fn spawn_notification(
        &self,
        kind: NotifyKind,
        post_id: &str,
        notifiee_id: &str,
        actor_id: &str,
        comment_id: &str,
    ) {
        if notifiee_id == actor_id {
            return;
        }
        let Some(notifications) = self.notifications.clone() else {
            return;
        };

        let post_id = post_id.to_string();
        let notifiee_id = notifiee_id.to_string();
        let actor_id = actor_id.to_string();
        let comment_id = comment_id.to_string();
        tokio::spawn(async move {
            let result = match kind {
                NotifyKind::PostComment => {
                    notifications
                        .notify_post_comment(&post_id, &notifiee_id, &actor_id, &comment_id)
                        .await
                }
                NotifyKind::Reply => {
                    notifications
                        .notify_comment_reply(&post_id, &notifiee_id, &actor_id, &comment_id)
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, post_id = %post_id, "Failed to send comment notification");
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum NotifyKind {
    PostComment,
    Reply,
}
