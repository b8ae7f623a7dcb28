//! User endpoints: profile posts and search.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use campus_common::AppResult;
use campus_core::{
    PageRequest, PostResponse, UserSearchResult,
    post::{DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT},
};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct UserPostsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn user_posts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UserPostsQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let request = PageRequest::new(query.page, query.limit, DEFAULT_FEED_LIMIT, MAX_FEED_LIMIT);
    let page = state
        .post_service
        .list_user_posts(&id, &user.id, request)
        .await?;
    Ok(ApiResponse::page(page))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

async fn search(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<UserSearchResult>>> {
    let users = state.user_service.search(&query.q).await?;
    Ok(ApiResponse::ok(users))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/posts", get(user_posts))
}

pub fn search_router() -> Router<AppState> {
    Router::new().route("/users", get(search))
}
