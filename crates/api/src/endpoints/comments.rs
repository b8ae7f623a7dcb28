//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use campus_common::AppResult;
use campus_core::{
    CommentResponse, PageRequest, ReactionToggleResult,
    comment::{DEFAULT_COMMENT_LIMIT, MAX_COMMENT_LIMIT},
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    #[serde(default)]
    pub content: String,
}

async fn edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EditCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .edit(&id, &user.id, &req.content)
        .await?;
    Ok(ApiResponse::ok(comment).with_message("Comment updated successfully"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedComments {
    /// The comment plus its replies.
    pub deleted_count: u64,
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DeletedComments>> {
    let deleted_count = state.comment_service.delete(&id, &user).await?;
    Ok(ApiResponse::ok(DeletedComments { deleted_count })
        .with_message("Comment deleted successfully"))
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    #[serde(rename = "type", alias = "reactionType")]
    pub reaction_type: String,
}

async fn react(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReactRequest>,
) -> AppResult<ApiResponse<ReactionToggleResult>> {
    let result = state
        .comment_service
        .toggle_reaction(&id, &user.id, &req.reaction_type)
        .await?;
    Ok(ApiResponse::ok(result))
}

#[derive(Debug, Deserialize)]
pub struct RepliesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn replies(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RepliesQuery>,
) -> AppResult<ApiResponse<Vec<CommentResponse>>> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        DEFAULT_COMMENT_LIMIT,
        MAX_COMMENT_LIMIT,
    );
    let page = state
        .comment_service
        .list_replies(&id, user.as_ref().map(|u| u.id.as_str()), request)
        .await?;
    Ok(ApiResponse::page(page))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(edit).delete(delete))
        .route("/{id}/react", post(react))
        .route("/{id}/replies", get(replies))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_react_request_field_names() {
        let current: ReactRequest = serde_json::from_str(r#"{"type":"LOVE"}"#).unwrap();
        assert_eq!(current.reaction_type, "LOVE");

        let older: ReactRequest = serde_json::from_str(r#"{"reactionType":"WOW"}"#).unwrap();
        assert_eq!(older.reaction_type, "WOW");

        assert!(serde_json::from_str::<ReactRequest>("{}").is_err());
    }
}
