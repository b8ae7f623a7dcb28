//! Post endpoints: feed, CRUD, likes, views and analytics.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use campus_common::{AppError, AppResult};
use campus_core::{
    BookmarkToggleResult, CommentResponse, CommentSort, LikeState, PageRequest, PostAnalytics, PostResponse,
    TrackViewInput, ViewCounts,
    comment::{DEFAULT_COMMENT_LIMIT, MAX_COMMENT_LIMIT},
    post::{DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT},
};
use campus_db::entities::post::{PostType, flexible_date};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, MaybeAuthUser, PostForm},
    middleware::AppState,
    response::ApiResponse,
};

/// Feed query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// A post type, or `ALL`.
    pub post_type: Option<String>,
}

fn parse_post_type(raw: Option<&str>) -> AppResult<Option<PostType>> {
    match raw.map(str::trim) {
        None | Some("" | "ALL") => Ok(None),
        Some(value) => serde_json::from_value(serde_json::Value::String(value.to_string()))
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Unknown post type: {value}"))),
    }
}

async fn list_feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let request = PageRequest::new(query.page, query.limit, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT);
    let post_type = parse_post_type(query.post_type.as_deref())?;

    let page = state
        .post_service
        .list_feed(&user.id, request, post_type)
        .await?;
    Ok(ApiResponse::page(page))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    form: PostForm,
) -> AppResult<ApiResponse<PostResponse>> {
    let (input, uploads) = form.into_create_input()?;
    let post = state.post_service.create(&user, input, uploads).await?;
    Ok(ApiResponse::created(post).with_message("Post created successfully"))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.get(&id, &user.id).await?;
    Ok(ApiResponse::ok(post))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: PostForm,
) -> AppResult<ApiResponse<PostResponse>> {
    let (input, uploads) = form.into_update_input()?;
    let post = state
        .post_service
        .update(&id, &user.id, input, uploads)
        .await?;
    Ok(ApiResponse::ok(post).with_message("Post updated successfully"))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.post_service.delete(&id, &user).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

async fn toggle_like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<LikeState>> {
    let like = state.like_service.toggle_like(&id, &user.id).await?;
    Ok(ApiResponse::ok(like))
}

async fn toggle_bookmark(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<BookmarkToggleResult>> {
    let result = state.bookmark_service.toggle(&id, &user.id).await?;
    let message = if result.bookmarked {
        "Post bookmarked"
    } else {
        "Bookmark removed"
    };
    Ok(ApiResponse::ok(result).with_message(message))
}

async fn share(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.post_service.share(&id, &user.id).await?;
    Ok(ApiResponse::message("Share recorded"))
}

/// View tracking body. Every field is optional and the body may be empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackViewRequest {
    pub duration: Option<i32>,
    pub source: Option<String>,
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn track_view(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<ApiResponse<ViewCounts>> {
    let req: TrackViewRequest = if body.is_empty() {
        TrackViewRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };

    let input = TrackViewInput {
        duration: req.duration,
        source: req.source,
        ip_address: client_ip(&headers),
    };
    let counts = state
        .view_service
        .track_view(&id, user.as_ref().map(|u| u.id.as_str()), input)
        .await?;
    Ok(ApiResponse::ok(counts))
}

/// Analytics window. Dates accept the same formats as post fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

fn parse_date(name: &str, raw: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => flexible_date::parse(value)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {name}: {value}"))),
    }
}

async fn analytics(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<ApiResponse<PostAnalytics>> {
    let from = parse_date("dateFrom", query.date_from.as_deref())?;
    let to = parse_date("dateTo", query.date_to.as_deref())?;

    let analytics = state
        .view_service
        .get_analytics(&id, &user.id, from, to)
        .await?;
    Ok(ApiResponse::ok(analytics))
}

/// Comment list query.
#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(default)]
    pub sort: CommentSort,
}

async fn list_comments(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        DEFAULT_COMMENT_LIMIT,
        MAX_COMMENT_LIMIT,
    );
    let page = state
        .comment_service
        .list(&id, user.as_ref().map(|u| u.id.as_str()), request, query.sort)
        .await?;
    Ok(ApiResponse::page(page))
}

/// New comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    #[serde(default)]
    pub content: String,
    pub parent_id: Option<String>,
}

async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let parent_id = req.parent_id.as_deref().filter(|p| !p.is_empty());
    let comment = state
        .comment_service
        .add(&id, &user, &req.content, parent_id)
        .await?;
    Ok(ApiResponse::created(comment).with_message("Comment added successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feed).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/bookmark", post(toggle_bookmark))
        .route("/{id}/share", post(share))
        .route("/{id}/view", post(track_view))
        .route("/{id}/analytics", get(analytics))
        .route("/{id}/comments", get(list_comments).post(add_comment))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_type() {
        assert_eq!(parse_post_type(None).unwrap(), None);
        assert_eq!(parse_post_type(Some("ALL")).unwrap(), None);
        assert_eq!(parse_post_type(Some("POLL")).unwrap(), Some(PostType::Poll));
        assert!(parse_post_type(Some("poll-ish")).is_err());
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.0.0.1, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers), Some("10.0.0.1".to_string()));
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("dateFrom", Some("2025-01-31")).unwrap().is_some());
        assert!(parse_date("dateFrom", Some("")).unwrap().is_none());
        assert!(parse_date("dateFrom", Some("yesterday")).is_err());
    }
}
