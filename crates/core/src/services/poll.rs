//! Poll service.
//!
//! Per (poll, user) the vote set moves from empty to one option (single
//! choice) or to a set bounded by `pollMaxChoices` (multiple choice). Once
//! the poll expires the set is frozen.

use campus_common::{AppError, AppResult, IdGenerator};
use campus_db::{
    entities::{
        poll_option, poll_vote,
        post::PollSettings,
    },
    repositories::{PollRepository, PostRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Serialize;

/// A poll option as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionResponse {
    pub id: String,
    pub text: String,
    pub position: i32,
    pub votes_count: i32,
}

impl From<&poll_option::Model> for PollOptionResponse {
    fn from(option: &poll_option::Model) -> Self {
        Self {
            id: option.id.clone(),
            text: option.text.clone(),
            position: option.position,
            votes_count: option.votes_count,
        }
    }
}

/// Complete poll state after a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub options: Vec<PollOptionResponse>,
    /// Option IDs the voter has picked.
    pub user_votes: Vec<String>,
    pub total_votes: i32,
}

/// How a valid vote is applied.
#[derive(Debug, PartialEq, Eq)]
pub enum VotePlan<'a> {
    /// Add the vote, leaving earlier ones in place.
    Add,
    /// Withdraw the earlier single-choice vote, then add.
    Transfer(&'a poll_vote::Model),
}

/// Decide whether `option_id` may be voted for, given the voter's existing votes on the poll.
pub fn plan_vote<'a>(
    settings: &PollSettings,
    existing: &'a [poll_vote::Model],
    option_id: &str,
    now: DateTime<Utc>,
) -> AppResult<VotePlan<'a>> {
    if settings.is_expired(now) {
        return Err(AppError::PollExpired);
    }

    if existing.iter().any(|v| v.option_id == option_id) {
        return Err(AppError::AlreadyVoted);
    }

    if !settings.allow_multiple {
        return Ok(existing.first().map_or(VotePlan::Add, VotePlan::Transfer));
    }

    if let Some(max_choices) = settings.max_choices
        && existing.len() >= max_choices.max(0) as usize
    {
        return Err(AppError::MaxChoicesReached(max_choices));
    }

    Ok(VotePlan::Add)
}

/// Sum of option counters.
#[must_use]
pub fn total_votes(options: &[poll_option::Model]) -> i32 {
    options.iter().map(|o| o.votes_count).sum()
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(poll_repo: PollRepository, post_repo: PostRepository) -> Self {
        Self {
            poll_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Vote for a poll option and return the full resulting poll state.
    ///
    /// The vote is planned against the voter's votes as read under the
    /// poll's row lock, so concurrent votes by one user apply one at a time.
    pub async fn vote(&self, option_id: &str, user_id: &str) -> AppResult<VoteResult> {
        let option = self
            .poll_repo
            .find_option(option_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll option not found".to_string()))?;

        let post = self
            .post_repo
            .get_visible(&option.post_id, Some(user_id))
            .await?;
        let settings = post
            .poll_settings()
            .ok_or_else(|| AppError::BadRequest("This post is not a poll".to_string()))?;

        let vote = poll_vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id.clone()),
            option_id: Set(option_id.to_string()),
            user_id: Set(user_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let state = self
            .poll_repo
            .cast_vote(vote, option_id, &post.id, user_id, |existing| {
                match plan_vote(&settings, existing, option_id, Utc::now())? {
                    VotePlan::Add => Ok(None),
                    VotePlan::Transfer(previous) => Ok(Some(previous.clone())),
                }
            })
            .await?;

        tracing::debug!(post_id = %post.id, option_id = %option_id, "Vote recorded");

        Ok(VoteResult {
            total_votes: total_votes(&state.options),
            options: state.options.iter().map(PollOptionResponse::from).collect(),
            user_votes: state.user_votes.into_iter().map(|v| v.option_id).collect(),
        })
    }
}
