//! Poll endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::post,
};
use campus_common::AppResult;
use campus_core::VoteResult;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Vote for one option. The response carries the whole poll state.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(option_id): Path<String>,
) -> AppResult<ApiResponse<VoteResult>> {
    let result = state.poll_service.vote(&option_id, &user.id).await?;
    Ok(ApiResponse::ok(result).with_message("Vote recorded successfully"))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{option_id}/vote", post(vote))
}
