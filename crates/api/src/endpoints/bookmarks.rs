//! Bookmark endpoints.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use campus_common::AppResult;
use campus_core::{
    PageRequest, PostResponse,
    bookmark::{DEFAULT_BOOKMARK_LIMIT, MAX_BOOKMARK_LIMIT},
};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct BookmarksQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<BookmarksQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        DEFAULT_BOOKMARK_LIMIT,
        MAX_BOOKMARK_LIMIT,
    );
    let page = state.bookmark_service.list(&user.id, request).await?;
    Ok(ApiResponse::page(page))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list))
}
