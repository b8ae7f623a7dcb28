//! Database entities.

pub mod bookmark;
pub mod comment;
pub mod comment_reaction;
pub mod notification;
pub mod poll_option;
pub mod poll_vote;
pub mod post;
pub mod post_like;
pub mod post_view;
pub mod quiz_question;
pub mod user;

pub use bookmark::Entity as Bookmark;
pub use comment::Entity as Comment;
pub use comment_reaction::Entity as CommentReaction;
pub use notification::Entity as Notification;
pub use poll_option::Entity as PollOption;
pub use poll_vote::Entity as PollVote;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use post_view::Entity as PostView;
pub use quiz_question::Entity as QuizQuestion;
pub use user::Entity as User;
