//! Post service.

use std::collections::{HashMap, HashSet};

use crate::services::{
    pagination::{PageRequest, Paginated},
    poll::{PollOptionResponse, total_votes},
    user::{AuthorInfo, UserService},
};
use bytes::Bytes;
use campus_common::{AppError, AppResult, IdGenerator, StorageService, generate_storage_key};
use campus_db::{
    entities::{
        poll_option,
        post::{self, MediaItem, PollSettings, PostDetails, PostType, Visibility},
        quiz_question, user,
    },
    repositories::{PollRepository, PostLikeRepository, PostRepository},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum post length in characters.
pub const MAX_CONTENT_LENGTH: usize = 2000;
pub const MIN_POLL_OPTIONS: usize = 2;
pub const MAX_POLL_OPTIONS: usize = 10;

pub const DEFAULT_FEED_LIMIT: u64 = 10;
pub const MAX_FEED_LIMIT: u64 = 50;

const DEFAULT_QUIZ_POINTS: i32 = 10;

/// One quiz question as submitted with a QUIZ post.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionInput {
    #[validate(length(min = 1, max = 500))]
    pub question: String,

    #[serde(default)]
    pub options: Vec<String>,

    /// Index into `options`.
    pub correct_answer: Option<i32>,

    #[validate(range(min = 0))]
    pub points: Option<i32>,

    pub explanation: Option<String>,
}

/// Input for creating a new post.
#[derive(Debug, Clone, Validate)]
pub struct CreatePostInput {
    pub content: String,
    /// Defaults to SCHOOL.
    pub visibility: Option<Visibility>,
    /// Type tag plus the type-specific fields.
    pub details: PostDetails,
    /// Option texts for POLL posts.
    pub poll_options: Vec<String>,
    #[validate(nested)]
    pub quiz_questions: Vec<QuizQuestionInput>,
}

/// Poll settings that may change after creation.
///
/// The outer `Option` says whether a field was sent at all. `Some(None)`
/// clears an expiry or a choice limit.
#[derive(Debug, Clone, Default)]
pub struct PollPatch {
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub allow_multiple: Option<bool>,
    pub max_choices: Option<Option<i32>>,
    pub is_anonymous: Option<bool>,
}

impl PollPatch {
    const fn is_empty(&self) -> bool {
        self.expires_at.is_none()
            && self.allow_multiple.is_none()
            && self.max_choices.is_none()
            && self.is_anonymous.is_none()
    }
}

/// Input for updating a post. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
    /// Existing media URLs to keep, in their new order.
    pub media_urls: Option<Vec<String>>,
    /// Existing media URLs to remove from storage.
    pub media_deleted: Option<Vec<String>>,
    /// Replaces every poll option when set.
    pub poll_options: Option<Vec<String>>,
    pub poll: PollPatch,
}

/// A file attached to a create or update request.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// A quiz question as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionResponse {
    pub id: String,
    pub question: String,
    pub options: serde_json::Value,
    pub correct_answer: i32,
    pub points: i32,
    pub position: i32,
    pub explanation: Option<String>,
}

impl From<&quiz_question::Model> for QuizQuestionResponse {
    fn from(question: &quiz_question::Model) -> Self {
        Self {
            id: question.id.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
            correct_answer: question.correct_answer,
            points: question.points,
            position: question.position,
            explanation: question.explanation.clone(),
        }
    }
}

/// A post as returned to clients.
///
/// `details` is flattened, so `postType` and the type-specific fields sit
/// at the top level next to the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(flatten)]
    pub details: PostDetails,
    pub visibility: Visibility,
    pub media_urls: Vec<String>,
    pub media_keys: Vec<String>,
    pub is_pinned: bool,
    pub is_edited: bool,
    pub likes_count: i32,
    pub comments_count: i32,
    pub shares_count: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub author: Option<AuthorInfo>,
    pub is_liked: bool,
    /// Only set on the bookmark list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bookmarked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_options: Option<Vec<PollOptionResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_votes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_votes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_poll_expired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_questions: Option<Vec<QuizQuestionResponse>>,
}

impl PostResponse {
    #[must_use]
    pub fn new(post: &post::Model, author: Option<AuthorInfo>, is_liked: bool) -> Self {
        let media = post.media_items();
        Self {
            id: post.id.clone(),
            author_id: post.author_id.clone(),
            content: post.content.clone(),
            details: post.details(),
            visibility: post.visibility.clone(),
            media_urls: media.iter().map(|m| m.url.clone()).collect(),
            media_keys: media.into_iter().map(|m| m.key).collect(),
            is_pinned: post.is_pinned,
            is_edited: post.is_edited,
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            shares_count: post.shares_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author,
            is_liked,
            is_bookmarked: None,
            poll_options: None,
            user_votes: None,
            total_votes: None,
            is_poll_expired: None,
            quiz_questions: None,
        }
    }

    /// Attach poll state. A no-op for non-poll posts.
    #[must_use]
    pub fn with_poll(
        mut self,
        options: &[poll_option::Model],
        user_votes: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        if let Some(settings) = self.details.poll() {
            self.is_poll_expired = Some(settings.is_expired(now));
            self.total_votes = Some(total_votes(options));
            self.poll_options = Some(options.iter().map(PollOptionResponse::from).collect());
            self.user_votes = Some(user_votes);
        }
        self
    }

    #[must_use]
    pub fn with_quiz(mut self, questions: &[quiz_question::Model]) -> Self {
        if self.details.post_type() == PostType::Quiz {
            self.quiz_questions = Some(questions.iter().map(QuizQuestionResponse::from).collect());
        }
        self
    }
}

/// Result of merging an edit's media fields into a post's media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlan {
    /// Media the post keeps, in order.
    pub media: Vec<MediaItem>,
    /// Media to remove from storage.
    pub removed: Vec<MediaItem>,
}

/// Merge retained URLs, deleted URLs and fresh uploads into a post's media.
///
/// Retained URLs are mapped back to their stored keys; URLs the post never
/// had are dropped. Uploads go last. With no media fields at all the
/// original media is kept as is.
#[must_use]
pub fn reconcile_media(
    original: &[MediaItem],
    retained: Option<&[String]>,
    deleted: Option<&[String]>,
    uploaded: Vec<MediaItem>,
) -> MediaPlan {
    if retained.is_none() && deleted.is_none() && uploaded.is_empty() {
        return MediaPlan {
            media: original.to_vec(),
            removed: vec![],
        };
    }

    let deleted: HashSet<&str> = deleted
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();

    let mut media: Vec<MediaItem> = match retained {
        Some(urls) => urls
            .iter()
            .filter(|url| !deleted.contains(url.as_str()))
            .filter_map(|url| original.iter().find(|m| &m.url == url).cloned())
            .collect(),
        None => original
            .iter()
            .filter(|m| !deleted.contains(m.url.as_str()))
            .cloned()
            .collect(),
    };

    // Anything of the original that did not survive leaves storage too.
    let removed: Vec<MediaItem> = original
        .iter()
        .filter(|m| !media.iter().any(|kept| kept.url == m.url))
        .cloned()
        .collect();

    media.extend(uploaded);

    MediaPlan { media, removed }
}

/// Trim and bound post content.
fn validate_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Content is required".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Content must be at most {MAX_CONTENT_LENGTH} characters"
        )));
    }
    Ok(content.to_string())
}

/// Check the option count and return the trimmed, non-blank option texts.
fn validate_poll_options(options: &[String]) -> AppResult<Vec<String>> {
    let options: Vec<String> = options
        .iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
        return Err(AppError::BadRequest(format!(
            "Poll must have between {MIN_POLL_OPTIONS} and {MAX_POLL_OPTIONS} options"
        )));
    }
    Ok(options)
}

/// Check poll settings against the option count and normalize them.
///
/// `max_choices` only applies to multiple-choice polls and is dropped otherwise.
fn validate_poll_settings(
    mut settings: PollSettings,
    option_count: usize,
    check_expiry: bool,
    now: DateTime<Utc>,
) -> AppResult<PollSettings> {
    if check_expiry
        && let Some(expires_at) = settings.expires_at
        && expires_at <= now
    {
        return Err(AppError::BadRequest(
            "Poll expiry must be in the future".to_string(),
        ));
    }

    if !settings.allow_multiple {
        settings.max_choices = None;
    }

    if let Some(max_choices) = settings.max_choices
        && (max_choices < 2 || max_choices as usize > option_count)
    {
        return Err(AppError::BadRequest(format!(
            "Max choices must be between 2 and {option_count}"
        )));
    }

    Ok(settings)
}

fn apply_poll_patch(mut settings: PollSettings, patch: &PollPatch) -> PollSettings {
    if let Some(expires_at) = patch.expires_at {
        settings.expires_at = expires_at;
    }
    if let Some(allow_multiple) = patch.allow_multiple {
        settings.allow_multiple = allow_multiple;
    }
    if let Some(max_choices) = patch.max_choices {
        settings.max_choices = max_choices;
    }
    if let Some(is_anonymous) = patch.is_anonymous {
        settings.is_anonymous = is_anonymous;
    }
    settings
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    poll_repo: PollRepository,
    like_repo: PostLikeRepository,
    users: UserService,
    storage: StorageService,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        poll_repo: PollRepository,
        like_repo: PostLikeRepository,
        users: UserService,
        storage: StorageService,
    ) -> Self {
        Self {
            post_repo,
            poll_repo,
            like_repo,
            users,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post, uploading its media first.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreatePostInput,
        uploads: Vec<MediaUpload>,
    ) -> AppResult<PostResponse> {
        input.validate()?;
        let content = validate_content(&input.content)?;
        let now = Utc::now();

        let (details, option_texts) = match input.details {
            PostDetails::Poll(settings) => {
                let options = validate_poll_options(&input.poll_options)?;
                let settings = validate_poll_settings(settings, options.len(), true, now)?;
                (PostDetails::Poll(settings), options)
            }
            other => (other, vec![]),
        };
        let post_type = details.post_type();
        let details_json =
            post::details_to_json(&details).map_err(|e| AppError::Internal(e.to_string()))?;

        let media = self.upload_all(&author.id, uploads).await?;

        let post_id = self.id_gen.generate();
        let post_model = post::ActiveModel {
            id: Set(post_id.clone()),
            author_id: Set(author.id.clone()),
            content: Set(content),
            post_type: Set(post_type),
            visibility: Set(input.visibility.unwrap_or(Visibility::School)),
            media: Set(post::media_to_json(&media)),
            details: Set(details_json),
            is_pinned: Set(false),
            is_edited: Set(false),
            likes_count: Set(0),
            comments_count: Set(0),
            shares_count: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let options = self.poll_option_models(&post_id, &option_texts, now);
        let questions = if post_type == PostType::Quiz {
            self.quiz_question_models(&post_id, &input.quiz_questions)
        } else {
            vec![]
        };

        let created = match self
            .post_repo
            .create_with_children(
                post_model,
                options.iter().map(poll_option_active_model).collect(),
                questions.iter().map(quiz_question_active_model).collect(),
            )
            .await
        {
            Ok(created) => created,
            Err(e) => {
                self.remove_media(&media).await;
                return Err(e);
            }
        };

        tracing::info!(post_id = %created.id, post_type = ?post_type, "Created post");

        Ok(PostResponse::new(&created, Some(AuthorInfo::from(author)), false)
            .with_poll(&options, vec![], now)
            .with_quiz(&questions))
    }

    /// Edit a post. Only its author may.
    pub async fn update(
        &self,
        post_id: &str,
        actor_id: &str,
        input: UpdatePostInput,
        uploads: Vec<MediaUpload>,
    ) -> AppResult<PostResponse> {
        let existing = self.post_repo.get_visible(post_id, Some(actor_id)).await?;
        if existing.author_id != actor_id {
            return Err(AppError::Forbidden(
                "You can only edit your own posts".to_string(),
            ));
        }

        let content = input.content.as_deref().map(validate_content).transpose()?;
        let now = Utc::now();

        let mut details = existing.details();
        let mut new_options = None;
        if let Some(settings) = details.poll().cloned()
            && (input.poll_options.is_some() || !input.poll.is_empty())
        {
            let option_count = match &input.poll_options {
                Some(raw) => {
                    let options = validate_poll_options(raw)?;
                    let count = options.len();
                    new_options = Some(options);
                    count
                }
                None => self.poll_repo.find_options(&existing.id).await?.len(),
            };
            let patched = apply_poll_patch(settings, &input.poll);
            let settings = validate_poll_settings(
                patched,
                option_count,
                matches!(input.poll.expires_at, Some(Some(_))),
                now,
            )?;
            details = PostDetails::Poll(settings);
        }
        let details_json =
            post::details_to_json(&details).map_err(|e| AppError::Internal(e.to_string()))?;

        let uploaded = self.upload_all(actor_id, uploads).await?;
        let plan = reconcile_media(
            &existing.media_items(),
            input.media_urls.as_deref(),
            input.media_deleted.as_deref(),
            uploaded.clone(),
        );

        let mut model = post::ActiveModel {
            id: Set(existing.id.clone()),
            media: Set(post::media_to_json(&plan.media)),
            details: Set(details_json),
            is_edited: Set(true),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        if let Some(content) = content {
            model.content = Set(content);
        }
        if let Some(visibility) = input.visibility {
            model.visibility = Set(visibility);
        }

        let result = match new_options {
            Some(options) => {
                let models = self.poll_option_models(&existing.id, &options, now);
                self.post_repo
                    .update_replacing_poll_options(
                        model,
                        models.iter().map(poll_option_active_model).collect(),
                    )
                    .await
                    .map(|(updated, discarded_votes)| {
                        tracing::warn!(
                            post_id = %updated.id,
                            discarded_votes = discarded_votes,
                            "Replaced poll options, earlier votes discarded"
                        );
                        updated
                    })
            }
            None => self.post_repo.update(model).await,
        };

        if let Err(e) = result {
            self.remove_media(&uploaded).await;
            return Err(e);
        }

        self.remove_media(&plan.removed).await;

        self.get(&existing.id, actor_id).await
    }

    /// Delete a post and its media. Allowed for the author and admins.
    pub async fn delete(&self, post_id: &str, actor: &user::Model) -> AppResult<()> {
        let existing = self.post_repo.get_by_id(post_id).await?;
        if existing.author_id != actor.id && !actor.is_admin() {
            return Err(AppError::Forbidden(
                "You can only delete your own posts".to_string(),
            ));
        }

        self.remove_media(&existing.media_items()).await;
        self.post_repo.delete(&existing.id).await?;

        tracing::info!(post_id = %existing.id, actor_id = %actor.id, "Deleted post");
        Ok(())
    }

    /// A single post as seen by `viewer_id`.
    ///
    /// Other authors' private posts are reported as missing.
    pub async fn get(&self, post_id: &str, viewer_id: &str) -> AppResult<PostResponse> {
        let post = self.post_repo.get_visible(post_id, Some(viewer_id)).await?;

        let questions = if post.post_type == PostType::Quiz {
            self.post_repo.find_quiz_questions(&post.id).await?
        } else {
            vec![]
        };

        let mut enriched = self.enrich(vec![post], viewer_id).await?;
        enriched
            .pop()
            .map(|p| p.with_quiz(&questions))
            .ok_or_else(|| AppError::PostNotFound(post_id.to_string()))
    }

    /// Record that a post was shared.
    pub async fn share(&self, post_id: &str, viewer_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_visible(post_id, Some(viewer_id)).await?;
        self.post_repo.increment_shares(&post.id).await?;

        tracing::debug!(post_id = %post.id, viewer_id = %viewer_id, "Share recorded");
        Ok(())
    }

    /// The feed: public and school posts plus the viewer's own, pinned first.
    pub async fn list_feed(
        &self,
        viewer_id: &str,
        request: PageRequest,
        post_type: Option<PostType>,
    ) -> AppResult<Paginated<PostResponse>> {
        let posts = self
            .post_repo
            .find_feed(viewer_id, post_type, request.offset(), request.limit)
            .await?;
        let total = self.post_repo.count_feed(viewer_id, post_type).await?;

        let items = self.enrich(posts, viewer_id).await?;
        Ok(Paginated::new(items, request, total))
    }

    /// Posts of one user. Private posts only on one's own profile.
    pub async fn list_user_posts(
        &self,
        user_id: &str,
        viewer_id: &str,
        request: PageRequest,
    ) -> AppResult<Paginated<PostResponse>> {
        let target = self.users.get(user_id).await?;
        let include_private = target.id == viewer_id;

        let posts = self
            .post_repo
            .find_by_author(&target.id, include_private, request.offset(), request.limit)
            .await?;
        let total = self
            .post_repo
            .count_by_author(&target.id, include_private)
            .await?;

        let items = self.enrich(posts, viewer_id).await?;
        Ok(Paginated::new(items, request, total))
    }

    /// Attach authors, like flags and poll state to a batch of posts.
    pub(crate) async fn enrich(
        &self,
        posts: Vec<post::Model>,
        viewer_id: &str,
    ) -> AppResult<Vec<PostResponse>> {
        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let author_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        let poll_ids: Vec<String> = posts
            .iter()
            .filter(|p| p.post_type == PostType::Poll)
            .map(|p| p.id.clone())
            .collect();

        let authors = self.users.authors(&author_ids).await?;
        let liked: HashSet<String> = self
            .like_repo
            .find_liked_post_ids(viewer_id, &ids)
            .await?
            .into_iter()
            .collect();

        let mut options: HashMap<String, Vec<poll_option::Model>> = HashMap::new();
        for option in self.poll_repo.find_options_for_posts(&poll_ids).await? {
            options.entry(option.post_id.clone()).or_default().push(option);
        }
        let mut votes: HashMap<String, Vec<String>> = HashMap::new();
        for vote in self
            .poll_repo
            .find_user_votes_for_posts(&poll_ids, viewer_id)
            .await?
        {
            votes.entry(vote.post_id).or_default().push(vote.option_id);
        }

        let now = Utc::now();
        Ok(posts
            .iter()
            .map(|p| {
                PostResponse::new(
                    p,
                    authors.get(&p.author_id).cloned(),
                    liked.contains(&p.id),
                )
                .with_poll(
                    options.get(&p.id).map(Vec::as_slice).unwrap_or_default(),
                    votes.remove(&p.id).unwrap_or_default(),
                    now,
                )
            })
            .collect())
    }

    /// Upload files in order. On failure the files already written are removed.
    async fn upload_all(
        &self,
        owner_id: &str,
        uploads: Vec<MediaUpload>,
    ) -> AppResult<Vec<MediaItem>> {
        let mut media = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let key = generate_storage_key(owner_id, &upload.file_name);
            match self
                .storage
                .upload(&key, &upload.data, &upload.content_type)
                .await
            {
                Ok(file) => media.push(MediaItem {
                    url: file.url,
                    key: file.key,
                }),
                Err(e) => {
                    self.remove_media(&media).await;
                    return Err(e);
                }
            }
        }
        Ok(media)
    }

    /// Best-effort removal from storage.
    async fn remove_media(&self, media: &[MediaItem]) {
        for item in media {
            if let Err(e) = self.storage.delete(&item.key).await {
                tracing::warn!(error = %e, key = %item.key, "Failed to delete media");
            }
        }
    }

    fn poll_option_models(
        &self,
        post_id: &str,
        texts: &[String],
        now: DateTime<Utc>,
    ) -> Vec<poll_option::Model> {
        texts
            .iter()
            .enumerate()
            .map(|(position, text)| poll_option::Model {
                id: self.id_gen.generate(),
                post_id: post_id.to_string(),
                text: text.clone(),
                position: position as i32,
                votes_count: 0,
                created_at: now.into(),
            })
            .collect()
    }

    fn quiz_question_models(
        &self,
        post_id: &str,
        questions: &[QuizQuestionInput],
    ) -> Vec<quiz_question::Model> {
        questions
            .iter()
            .enumerate()
            .map(|(position, q)| quiz_question::Model {
                id: self.id_gen.generate(),
                post_id: post_id.to_string(),
                question: q.question.trim().to_string(),
                options: serde_json::json!(q.options),
                correct_answer: q.correct_answer.unwrap_or(0),
                points: q.points.unwrap_or(DEFAULT_QUIZ_POINTS),
                position: position as i32,
                explanation: q.explanation.clone().filter(|e| !e.trim().is_empty()),
            })
            .collect()
    }
}

fn poll_option_active_model(model: &poll_option::Model) -> poll_option::ActiveModel {
    poll_option::ActiveModel {
        id: Set(model.id.clone()),
        post_id: Set(model.post_id.clone()),
        text: Set(model.text.clone()),
        position: Set(model.position),
        votes_count: Set(model.votes_count),
        created_at: Set(model.created_at),
    }
}

fn quiz_question_active_model(model: &quiz_question::Model) -> quiz_question::ActiveModel {
    quiz_question::ActiveModel {
        id: Set(model.id.clone()),
        post_id: Set(model.post_id.clone()),
        question: Set(model.question.clone()),
        options: Set(model.options.clone()),
        correct_answer: Set(model.correct_answer),
        points: Set(model.points),
        position: Set(model.position),
        explanation: Set(model.explanation.clone()),
    }
}
