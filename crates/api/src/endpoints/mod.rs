//! API endpoints.

mod bookmarks;
mod comments;
mod notifications;
mod polls;
mod posts;
mod users;

use axum::{Router, routing::get};

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/polls", polls::router())
        .nest("/users", users::router())
        .nest("/search", users::search_router())
        .nest("/bookmarks", bookmarks::router())
        .nest("/notifications", notifications::router())
        .route("/streaming", get(sse::stream_handler))
}
