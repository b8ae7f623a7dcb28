//! Poll repository.

use std::sync::Arc;

use super::post::lock_post;
use crate::entities::{PollOption, PollVote, poll_option, poll_vote};
use campus_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, sea_query::Expr,
};

/// Options and the voter's own vote set after a vote was recorded.
#[derive(Debug, Clone)]
pub struct PollState {
    /// All options of the poll in display order.
    pub options: Vec<poll_option::Model>,
    /// The voter's votes on this poll.
    pub user_votes: Vec<poll_vote::Model>,
}

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an option by ID.
    pub async fn find_option(&self, option_id: &str) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(option_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Options of one poll in display order.
    pub async fn find_options(&self, post_id: &str) -> AppResult<Vec<poll_option::Model>> {
        find_options(self.db.as_ref(), post_id).await
    }

    /// Options of several polls, ordered by position within each poll.
    pub async fn find_options_for_posts(
        &self,
        post_ids: &[String],
    ) -> AppResult<Vec<poll_option::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        PollOption::find()
            .filter(poll_option::Column::PostId.is_in(post_ids.to_vec()))
            .order_by_asc(poll_option::Column::PostId)
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's votes across several polls.
    pub async fn find_user_votes_for_posts(
        &self,
        post_ids: &[String],
        user_id: &str,
    ) -> AppResult<Vec<poll_vote::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        PollVote::find()
            .filter(poll_vote::Column::PostId.is_in(post_ids.to_vec()))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .order_by_asc(poll_vote::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a vote under the poll's row lock.
    ///
    /// `plan` sees the voter's current votes as read inside the transaction and
    /// returns the vote to withdraw first, if any. The withdrawal, the insert,
    /// both counter updates and the re-read of the poll state share one
    /// transaction, so a single-choice voter never ends up holding two options.
    pub async fn cast_vote<F>(
        &self,
        vote: poll_vote::ActiveModel,
        option_id: &str,
        post_id: &str,
        user_id: &str,
        plan: F,
    ) -> AppResult<PollState>
    where
        F: FnOnce(&[poll_vote::Model]) -> AppResult<Option<poll_vote::Model>> + Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        lock_post(&txn, post_id).await?;

        let existing = find_user_votes(&txn, post_id, user_id).await?;

        if let Some(previous) = plan(&existing)? {
            let deleted = PollVote::delete_by_id(previous.id.clone())
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if deleted.rows_affected == 0 {
                return Err(AppError::Conflict("Previous vote was already withdrawn".to_string()));
            }

            PollOption::update_many()
                .col_expr(
                    poll_option::Column::VotesCount,
                    Expr::cust("GREATEST(votes_count - 1, 0)"),
                )
                .filter(poll_option::Column::Id.eq(&previous.option_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        PollVote::insert(vote)
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollOption::update_many()
            .col_expr(
                poll_option::Column::VotesCount,
                Expr::col(poll_option::Column::VotesCount).add(1),
            )
            .filter(poll_option::Column::Id.eq(option_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let options = find_options(&txn, post_id).await?;
        let user_votes = find_user_votes(&txn, post_id, user_id).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PollState {
            options,
            user_votes,
        })
    }
}

async fn find_options<C: ConnectionTrait>(
    conn: &C,
    post_id: &str,
) -> AppResult<Vec<poll_option::Model>> {
    PollOption::find()
        .filter(poll_option::Column::PostId.eq(post_id))
        .order_by_asc(poll_option::Column::Position)
        .all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

async fn find_user_votes<C: ConnectionTrait>(
    conn: &C,
    post_id: &str,
    user_id: &str,
) -> AppResult<Vec<poll_vote::Model>> {
    PollVote::find()
        .filter(poll_vote::Column::PostId.eq(post_id))
        .filter(poll_vote::Column::UserId.eq(user_id))
        .order_by_asc(poll_vote::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};
    use std::collections::BTreeMap;

    fn lock_row() -> BTreeMap<&'static str, sea_orm::Value> {
        BTreeMap::from([("id", "poll1".into())])
    }

    fn new_vote(id: &str, option_id: &str) -> poll_vote::ActiveModel {
        poll_vote::ActiveModel {
            id: Set(id.to_string()),
            post_id: Set("poll1".to_string()),
            option_id: Set(option_id.to_string()),
            user_id: Set("user1".to_string()),
            created_at: Set(Utc::now().into()),
        }
    }

    fn option(id: &str, position: i32, votes_count: i32) -> poll_option::Model {
        poll_option::Model {
            id: id.to_string(),
            post_id: "poll1".to_string(),
            text: format!("Option {id}"),
            position,
            votes_count,
            created_at: Utc::now().into(),
        }
    }

    fn vote(id: &str, option_id: &str) -> poll_vote::Model {
        poll_vote::Model {
            id: id.to_string(),
            post_id: "poll1".to_string(),
            option_id: option_id.to_string(),
            user_id: "user1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_find_options_for_posts_empty() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = PollRepository::new(db);

        assert!(repo.find_options_for_posts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_transfers_single_choice() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![lock_row()]])
                .append_query_results([[vote("v1", "a")]])
                // delete previous vote, decrement a, insert vote, increment b
                .append_exec_results([exec(1), exec(1), exec(1), exec(1)])
                .append_query_results([[option("a", 0, 0), option("b", 1, 1)]])
                .append_query_results([[vote("v2", "b")]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let state = repo
            .cast_vote(new_vote("v2", "b"), "b", "poll1", "user1", |existing| {
                Ok(existing.first().cloned())
            })
            .await
            .unwrap();

        assert_eq!(state.options.len(), 2);
        assert_eq!(state.options[0].votes_count, 0);
        assert_eq!(state.options[1].votes_count, 1);
        assert_eq!(state.user_votes.len(), 1);
        assert_eq!(state.user_votes[0].option_id, "b");
    }

    #[tokio::test]
    async fn test_cast_vote_plans_against_votes_read_under_lock() {
        // A concurrent transfer already moved the user to "c" by the time the
        // lock is granted; planning sees that vote, not the stale one.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![lock_row()]])
                .append_query_results([[vote("v3", "c")]])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo
            .cast_vote(new_vote("v4", "c"), "c", "poll1", "user1", |existing| {
                if existing.iter().any(|v| v.option_id == "c") {
                    return Err(AppError::AlreadyVoted);
                }
                Ok(existing.first().cloned())
            })
            .await;

        assert!(matches!(result, Err(AppError::AlreadyVoted)));
    }

    #[tokio::test]
    async fn test_cast_vote_rolls_back_when_withdrawal_finds_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![lock_row()]])
                .append_query_results([[vote("v1", "a")]])
                // Only the DELETE is mocked; any later statement would fail the mock.
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let repo = PollRepository::new(db);
        let result = repo
            .cast_vote(new_vote("v2", "b"), "b", "poll1", "user1", |existing| {
                Ok(existing.first().cloned())
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
