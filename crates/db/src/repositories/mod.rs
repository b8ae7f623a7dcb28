//! Database repositories.

pub mod bookmark;
pub mod comment;
pub mod comment_reaction;
pub mod notification;
pub mod poll;
pub mod post;
pub mod post_like;
pub mod post_view;
pub mod user;

pub use bookmark::BookmarkRepository;
pub use comment::CommentRepository;
pub use comment_reaction::{CommentReactionRepository, ReactionTally};
pub use notification::NotificationRepository;
pub use poll::{PollRepository, PollState};
pub use post::PostRepository;
pub use post_like::PostLikeRepository;
pub use post_view::PostViewRepository;
pub use user::UserRepository;
