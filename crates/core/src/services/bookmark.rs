//! Bookmark service.

use std::collections::HashMap;

use crate::services::{
    pagination::{PageRequest, Paginated},
    post::{PostResponse, PostService},
};
use campus_common::{AppResult, IdGenerator};
use campus_db::{
    entities::bookmark,
    repositories::{BookmarkRepository, PostRepository},
};
use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;

pub const DEFAULT_BOOKMARK_LIMIT: u64 = 20;
pub const MAX_BOOKMARK_LIMIT: u64 = 50;

/// Outcome of a bookmark toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkToggleResult {
    pub bookmarked: bool,
}

/// Bookmark service for business logic.
#[derive(Clone)]
pub struct BookmarkService {
    bookmark_repo: BookmarkRepository,
    post_repo: PostRepository,
    posts: PostService,
    id_gen: IdGenerator,
}

impl BookmarkService {
    /// Create a new bookmark service.
    #[must_use]
    pub const fn new(
        bookmark_repo: BookmarkRepository,
        post_repo: PostRepository,
        posts: PostService,
    ) -> Self {
        Self {
            bookmark_repo,
            post_repo,
            posts,
            id_gen: IdGenerator::new(),
        }
    }

    /// Bookmark the post if the user hasn't, remove the bookmark otherwise.
    pub async fn toggle(&self, post_id: &str, user_id: &str) -> AppResult<BookmarkToggleResult> {
        let post = self.post_repo.get_visible(post_id, Some(user_id)).await?;

        let bookmarked = if let Some(existing) = self.bookmark_repo.find(&post.id, user_id).await? {
            self.bookmark_repo.delete(&existing.id).await?;
            false
        } else {
            let model = bookmark::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post.id.clone()),
                user_id: Set(user_id.to_string()),
                created_at: Set(Utc::now().into()),
            };
            self.bookmark_repo.create(model).await?;
            true
        };

        tracing::debug!(post_id = %post.id, user_id = %user_id, bookmarked, "Toggled bookmark");
        Ok(BookmarkToggleResult { bookmarked })
    }

    /// The user's bookmarked posts, most recently saved first.
    ///
    /// Posts that have since turned private are left out of the page.
    pub async fn list(
        &self,
        user_id: &str,
        request: PageRequest,
    ) -> AppResult<Paginated<PostResponse>> {
        let bookmarks = self
            .bookmark_repo
            .find_by_user(user_id, request.offset(), request.limit)
            .await?;
        let total = self.bookmark_repo.count_by_user(user_id).await?;

        let ids: Vec<String> = bookmarks.iter().map(|b| b.post_id.clone()).collect();
        let mut by_id: HashMap<String, _> = self
            .post_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|p| p.is_visible_to(Some(user_id)))
            .map(|p| (p.id.clone(), p))
            .collect();
        let posts = ids.iter().filter_map(|id| by_id.remove(id)).collect();

        let items = self
            .posts
            .enrich(posts, user_id)
            .await?
            .into_iter()
            .map(|mut p| {
                p.is_bookmarked = Some(true);
                p
            })
            .collect();

        Ok(Paginated::new(items, request, total))
    }
}
