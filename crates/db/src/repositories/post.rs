//! Post repository.

use std::sync::Arc;

use crate::entities::{
    Post, PollOption, PollVote, QuizQuestion, poll_option, poll_vote,
    post::{self, PostType, Visibility},
    quiz_question,
};
use campus_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};

/// Take the row lock on a post inside `conn`'s transaction.
///
/// Writers that read-then-modify rows hanging off a post serialize on this
/// lock until commit.
pub(crate) async fn lock_post<C: ConnectionTrait>(conn: &C, post_id: &str) -> AppResult<()> {
    Post::find_by_id(post_id)
        .select_only()
        .column(post::Column::Id)
        .lock_exclusive()
        .into_tuple::<String>()
        .one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .map(|_| ())
        .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Find a post `viewer_id` may see. Other authors' private posts are
    /// reported as missing.
    pub async fn get_visible(&self, id: &str, viewer_id: Option<&str>) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .filter(|post| post.is_visible_to(viewer_id))
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Posts by ID, in no particular order.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<post::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Post::find()
            .filter(post::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Bump `shares_count` by one.
    pub async fn increment_shares(&self, id: &str) -> AppResult<()> {
        let result = Post::update_many()
            .col_expr(
                post::Column::SharesCount,
                Expr::col(post::Column::SharesCount).add(1),
            )
            .filter(post::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::PostNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Insert a post together with its poll options and quiz questions.
    pub async fn create_with_children(
        &self,
        model: post::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
        questions: Vec<quiz_question::ActiveModel>,
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !options.is_empty() {
            PollOption::insert_many(options)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        if !questions.is_empty() {
            QuizQuestion::insert_many(questions)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll post and swap its whole option list.
    ///
    /// Old options go away with every vote cast on them. Returns the updated
    /// post and the number of discarded votes.
    pub async fn update_replacing_poll_options(
        &self,
        model: post::ActiveModel,
        options: Vec<poll_option::ActiveModel>,
    ) -> AppResult<(post::Model, u64)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = model
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let discarded_votes = PollVote::find()
            .filter(poll_vote::Column::PostId.eq(&updated.id))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Votes cascade with their options.
        PollOption::delete_many()
            .filter(poll_option::Column::PostId.eq(&updated.id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !options.is_empty() {
            PollOption::insert_many(options)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((updated, discarded_votes))
    }

    /// Delete a post. Options, votes, comments, likes and views cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Feed page: public and school posts plus the viewer's own, pinned first.
    pub async fn find_feed(
        &self,
        viewer_id: &str,
        post_type: Option<PostType>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(feed_condition(viewer_id, post_type))
            .order_by_desc(post::Column::IsPinned)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Total number of posts matching [`Self::find_feed`].
    pub async fn count_feed(&self, viewer_id: &str, post_type: Option<PostType>) -> AppResult<u64> {
        Post::find()
            .filter(feed_condition(viewer_id, post_type))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Posts by one author, newest first. Private posts only when `include_private`.
    pub async fn find_by_author(
        &self,
        author_id: &str,
        include_private: bool,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(author_condition(author_id, include_private))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Total number of posts matching [`Self::find_by_author`].
    pub async fn count_by_author(&self, author_id: &str, include_private: bool) -> AppResult<u64> {
        Post::find()
            .filter(author_condition(author_id, include_private))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Quiz questions of a post in display order.
    pub async fn find_quiz_questions(&self, post_id: &str) -> AppResult<Vec<quiz_question::Model>> {
        QuizQuestion::find()
            .filter(quiz_question::Column::PostId.eq(post_id))
            .order_by_asc(quiz_question::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn shared_visibility() -> Condition {
    Condition::any()
        .add(post::Column::Visibility.eq(Visibility::Public))
        .add(post::Column::Visibility.eq(Visibility::School))
}

fn feed_condition(viewer_id: &str, post_type: Option<PostType>) -> Condition {
    let mut condition =
        Condition::all().add(shared_visibility().add(post::Column::AuthorId.eq(viewer_id)));

    if let Some(post_type) = post_type {
        condition = condition.add(post::Column::PostType.eq(post_type));
    }

    condition
}

fn author_condition(author_id: &str, include_private: bool) -> Condition {
    let condition = Condition::all().add(post::Column::AuthorId.eq(author_id));

    if include_private {
        condition
    } else {
        condition.add(shared_visibility())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::post::{PostDetails, details_to_json, media_to_json};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_post(id: &str, author_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            content: "Field trip on Friday".to_string(),
            post_type: PostType::Article,
            visibility: Visibility::School,
            media: media_to_json(&[]),
            details: details_to_json(&PostDetails::Article).unwrap(),
            is_pinned: false,
            is_edited: false,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.get_by_id("missing").await;

        match result {
            Err(AppError::PostNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected PostNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_visible_hides_private_posts_of_others() {
        let mut private = create_test_post("post1", "owner");
        private.visibility = Visibility::Private;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[private.clone()]])
                .append_query_results([[private.clone()]])
                .append_query_results([[private]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);

        let stranger = repo.get_visible("post1", Some("stranger")).await;
        assert!(matches!(stranger, Err(AppError::PostNotFound(_))));

        let anonymous = repo.get_visible("post1", None).await;
        assert!(matches!(anonymous, Err(AppError::PostNotFound(_))));

        let owner = repo.get_visible("post1", Some("owner")).await.unwrap();
        assert_eq!(owner.id, "post1");
    }

    #[tokio::test]
    async fn test_increment_shares_on_missing_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo.increment_shares("missing").await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_feed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_post("post2", "user2"),
                    create_test_post("post1", "user1"),
                ]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let result = repo
            .find_feed("user1", Some(PostType::Article), 0, 10)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "post2");
    }

    #[tokio::test]
    async fn test_create_with_children_commits() {
        let post = create_test_post("post1", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db.clone());
        let options = ["Yes", "No"]
            .iter()
            .enumerate()
            .map(|(i, text)| poll_option::ActiveModel {
                id: Set(format!("opt{i}")),
                post_id: Set("post1".to_string()),
                text: Set((*text).to_string()),
                position: Set(i as i32),
                votes_count: Set(0),
                created_at: Set(Utc::now().into()),
            })
            .collect();

        let created = repo
            .create_with_children(post.clone().into(), options, vec![])
            .await
            .unwrap();

        assert_eq!(created.id, "post1");
    }

    #[test]
    fn test_author_condition_hides_private_from_others() {
        use sea_orm::QueryTrait;

        let sql = Post::find()
            .filter(author_condition("user1", false))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("PUBLIC"));
        assert!(sql.contains("SCHOOL"));

        let own = Post::find()
            .filter(author_condition("user1", true))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(!own.contains("SCHOOL"));
    }
}
