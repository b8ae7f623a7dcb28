//! HTTP API layer for campus-feed.
//!
//! - **Endpoints**: posts, comments, polls, views, users and notifications
//! - **Extractors**: bearer-token authentication and the post form
//! - **Streaming**: feed events over Server-Sent Events
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

pub use endpoints::router;
pub use middleware::AppState;
pub use sse::SseBroadcaster;
