//! Comment reaction repository.

use std::sync::Arc;

use crate::entities::{
    CommentReaction,
    comment_reaction::{self, ReactionType},
};
use campus_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// One row of a grouped reaction tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionTally {
    /// Comment the reactions belong to.
    pub comment_id: String,
    /// Reaction kind.
    pub reaction_type: ReactionType,
    /// Number of users holding this reaction.
    pub count: i64,
}

/// Comment reaction repository for database operations.
#[derive(Clone)]
pub struct CommentReactionRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentReactionRepository {
    /// Create a new comment reaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's reaction of one type on a comment.
    pub async fn find(
        &self,
        comment_id: &str,
        user_id: &str,
        reaction_type: ReactionType,
    ) -> AppResult<Option<comment_reaction::Model>> {
        CommentReaction::find()
            .filter(comment_reaction::Column::CommentId.eq(comment_id))
            .filter(comment_reaction::Column::UserId.eq(user_id))
            .filter(comment_reaction::Column::ReactionType.eq(reaction_type))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a reaction.
    pub async fn create(
        &self,
        model: comment_reaction::ActiveModel,
    ) -> AppResult<comment_reaction::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a reaction.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        CommentReaction::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// A user's reactions on the given comments, oldest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> AppResult<Vec<comment_reaction::Model>> {
        if comment_ids.is_empty() {
            return Ok(vec![]);
        }

        CommentReaction::find()
            .filter(comment_reaction::Column::UserId.eq(user_id))
            .filter(comment_reaction::Column::CommentId.is_in(comment_ids.to_vec()))
            .order_by_asc(comment_reaction::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Reaction counts grouped by comment and type, in one query.
    pub async fn tally(&self, comment_ids: &[String]) -> AppResult<Vec<ReactionTally>> {
        if comment_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(String, ReactionType, i64)> = CommentReaction::find()
            .select_only()
            .column(comment_reaction::Column::CommentId)
            .column(comment_reaction::Column::ReactionType)
            .column_as(comment_reaction::Column::Id.count(), "count")
            .filter(comment_reaction::Column::CommentId.is_in(comment_ids.to_vec()))
            .group_by(comment_reaction::Column::CommentId)
            .group_by(comment_reaction::Column::ReactionType)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(comment_id, reaction_type, count)| ReactionTally {
                comment_id,
                reaction_type,
                count,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_find_existing_reaction() {
        let reaction = comment_reaction::Model {
            id: "r1".to_string(),
            comment_id: "c1".to_string(),
            user_id: "user1".to_string(),
            reaction_type: ReactionType::Love,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[reaction.clone()]])
                .into_connection(),
        );

        let repo = CommentReactionRepository::new(db);
        let found = repo.find("c1", "user1", ReactionType::Love).await.unwrap();

        assert_eq!(found, Some(reaction));
    }

    #[tokio::test]
    async fn test_tally_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = CommentReactionRepository::new(db);

        assert!(repo.tally(&[]).await.unwrap().is_empty());
        assert!(repo.find_by_user("user1", &[]).await.unwrap().is_empty());
    }
}
