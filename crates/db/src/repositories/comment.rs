//! Comment repository.

use std::{collections::HashMap, sync::Arc};

use super::post::lock_post;
use crate::entities::{Comment, Post, comment, post};
use campus_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound(id.to_string()))
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a comment and bump the post's `comments_count` in one transaction.
    pub async fn create(&self, model: comment::ActiveModel, post_id: &str) -> AppResult<comment::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Post::update_many()
            .col_expr(
                post::Column::CommentsCount,
                Expr::col(post::Column::CommentsCount).add(1),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Delete a comment with its whole reply subtree.
    ///
    /// The post's `comments_count` drops by the number of removed rows, all in
    /// one transaction holding the post's row lock. Returns that number, or
    /// `Conflict` when the comment vanished before the delete ran.
    pub async fn delete(&self, target: &comment::Model) -> AppResult<u64> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_post(&txn, &target.post_id).await?;

        let mut removed: u64 = 1;
        let mut frontier = vec![target.id.clone()];
        while !frontier.is_empty() {
            let children: Vec<String> = Comment::find()
                .select_only()
                .column(comment::Column::Id)
                .filter(comment::Column::ParentId.is_in(frontier))
                .into_tuple()
                .all(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            removed += children.len() as u64;
            frontier = children;
        }

        // Replies cascade with their parent.
        let deleted = Comment::delete_by_id(target.id.clone())
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if deleted.rows_affected == 0 {
            return Err(AppError::Conflict("Comment was already deleted".to_string()));
        }

        Post::update_many()
            .col_expr(
                post::Column::CommentsCount,
                Expr::cust(format!("GREATEST(comments_count - {removed}, 0)")),
            )
            .filter(post::Column::Id.eq(&target.post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(removed)
    }

    /// Top-level comments of a post, newest first unless `oldest_first`.
    pub async fn find_top_level(
        &self,
        post_id: &str,
        oldest_first: bool,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<comment::Model>> {
        let query = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::ParentId.is_null());

        let query = if oldest_first {
            query
                .order_by_asc(comment::Column::CreatedAt)
                .order_by_asc(comment::Column::Id)
        } else {
            query
                .order_by_desc(comment::Column::CreatedAt)
                .order_by_desc(comment::Column::Id)
        };

        query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of top-level comments on a post.
    pub async fn count_top_level(&self, post_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .filter(comment::Column::ParentId.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Direct replies to a comment, oldest first.
    pub async fn find_replies(
        &self,
        parent_id: &str,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::ParentId.eq(parent_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// First `per_parent` replies of each parent, oldest first.
    pub async fn find_reply_previews(
        &self,
        parent_ids: &[String],
        per_parent: u64,
    ) -> AppResult<Vec<comment::Model>> {
        let pages = futures::future::try_join_all(
            parent_ids
                .iter()
                .map(|parent_id| self.find_replies(parent_id, 0, per_parent)),
        )
        .await?;

        Ok(pages.into_iter().flatten().collect())
    }

    /// Direct reply counts keyed by parent ID. Parents without replies are absent.
    pub async fn count_replies(&self, parent_ids: &[String]) -> AppResult<HashMap<String, i64>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, i64)> = Comment::find()
            .select_only()
            .column(comment::Column::ParentId)
            .column_as(comment::Column::Id.count(), "count")
            .filter(comment::Column::ParentId.is_in(parent_ids.to_vec()))
            .group_by(comment::Column::ParentId)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::collections::BTreeMap;

    fn create_test_comment(id: &str, parent_id: Option<&str>) -> comment::Model {
        let now = Utc::now();
        comment::Model {
            id: id.to_string(),
            post_id: "post1".to_string(),
            author_id: "user1".to_string(),
            parent_id: parent_id.map(str::to_string),
            content: format!("comment {id}"),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn id_row(id: &str) -> BTreeMap<&'static str, sea_orm::Value> {
        BTreeMap::from([("id", id.into())])
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.get_by_id("nope").await;

        assert!(matches!(result, Err(AppError::CommentNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_counts_descendants() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // post lock, then children of c1, of r1/r2, of r3
                .append_query_results([vec![id_row("post1")]])
                .append_query_results([vec![id_row("r1"), id_row("r2")]])
                .append_query_results([vec![id_row("r3")]])
                .append_query_results([Vec::<BTreeMap<&'static str, sea_orm::Value>>::new()])
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let removed = repo
            .delete(&create_test_comment("c1", None))
            .await
            .unwrap();

        assert_eq!(removed, 4);
    }

    #[tokio::test]
    async fn test_delete_of_vanished_comment_keeps_counter() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![id_row("post1")]])
                .append_query_results([Vec::<BTreeMap<&'static str, sea_orm::Value>>::new()])
                // Only the DELETE is mocked; a counter update would fail the mock.
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.delete(&create_test_comment("c1", None)).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_on_missing_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<BTreeMap<&'static str, sea_orm::Value>>::new()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.delete(&create_test_comment("c1", None)).await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_reply_previews_flattens_pages() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_comment("r1", Some("c1")),
                    create_test_comment("r2", Some("c1")),
                ]])
                .append_query_results([[create_test_comment("r3", Some("c2"))]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let replies = repo
            .find_reply_previews(&["c1".to_string(), "c2".to_string()], 3)
            .await
            .unwrap();

        assert_eq!(replies.len(), 3);
    }

    #[tokio::test]
    async fn test_count_replies_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = CommentRepository::new(db);

        assert!(repo.count_replies(&[]).await.unwrap().is_empty());
    }
}
