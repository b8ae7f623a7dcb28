//! Post view repository.

use std::sync::Arc;

use crate::entities::{PostView, post_view};
use campus_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, sea_query::Expr,
};

/// Post view repository for database operations.
#[derive(Clone)]
pub struct PostViewRepository {
    db: Arc<DatabaseConnection>,
}

impl PostViewRepository {
    /// Create a new post view repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Most recent view of a post by a user since `since`.
    pub async fn find_recent_by_user(
        &self,
        post_id: &str,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Option<post_view::Model>> {
        PostView::find()
            .filter(post_view::Column::PostId.eq(post_id))
            .filter(post_view::Column::UserId.eq(user_id))
            .filter(post_view::Column::ViewedAt.gte(since))
            .order_by_desc(post_view::Column::ViewedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a view.
    pub async fn create(&self, model: post_view::ActiveModel) -> AppResult<post_view::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the duration of an existing view.
    pub async fn update_duration(&self, id: &str, duration: i32) -> AppResult<()> {
        PostView::update_many()
            .col_expr(post_view::Column::Duration, Expr::value(duration))
            .filter(post_view::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Total recorded views of a post.
    pub async fn count_views(&self, post_id: &str) -> AppResult<u64> {
        PostView::find()
            .filter(post_view::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct signed-in viewers of a post.
    pub async fn count_unique_viewers(&self, post_id: &str) -> AppResult<i64> {
        let count: Option<i64> = PostView::find()
            .select_only()
            .column_as(Expr::col(post_view::Column::UserId).count_distinct(), "count")
            .filter(post_view::Column::PostId.eq(post_id))
            .filter(post_view::Column::UserId.is_not_null())
            .into_tuple()
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count.unwrap_or(0))
    }

    /// Views of a post inside `[from, to]`, oldest first.
    pub async fn find_in_window(
        &self,
        post_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<post_view::Model>> {
        PostView::find()
            .filter(post_view::Column::PostId.eq(post_id))
            .filter(post_view::Column::ViewedAt.gte(from))
            .filter(post_view::Column::ViewedAt.lte(to))
            .order_by_asc(post_view::Column::ViewedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_view(id: &str, user_id: Option<&str>) -> post_view::Model {
        post_view::Model {
            id: id.to_string(),
            post_id: "post1".to_string(),
            user_id: user_id.map(str::to_string),
            viewed_at: Utc::now().into(),
            duration: Some(12),
            source: Some("feed".to_string()),
            ip_address: None,
        }
    }

    #[tokio::test]
    async fn test_find_recent_by_user() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_view("v1", Some("user1"))]])
                .into_connection(),
        );

        let repo = PostViewRepository::new(db);
        let view = repo
            .find_recent_by_user("post1", "user1", Utc::now() - chrono::Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(view.unwrap().duration, Some(12));
    }

    #[tokio::test]
    async fn test_find_in_window() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_view("v1", Some("user1")),
                    create_test_view("v2", None),
                ]])
                .into_connection(),
        );

        let repo = PostViewRepository::new(db);
        let views = repo
            .find_in_window("post1", Utc::now() - chrono::Duration::days(7), Utc::now())
            .await
            .unwrap();

        assert_eq!(views.len(), 2);
    }
}
