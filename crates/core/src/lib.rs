//! Core business logic for campus-feed.
//!
//! Services sit between the HTTP layer and the repositories. They own the
//! permission checks, input validation, poll rules and the best-effort side
//! effects (media cleanup, notifications, real-time events).

pub mod services;

pub use services::*;
