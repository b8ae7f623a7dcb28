//! Business logic services.

#![allow(missing_docs)]

pub mod bookmark;
pub mod comment;
pub mod event_publisher;
pub mod like;
pub mod notification;
pub mod pagination;
pub mod poll;
pub mod post;
pub mod user;
pub mod view;

pub use bookmark::{BookmarkService, BookmarkToggleResult};
pub use comment::{
    CommentResponse, CommentService, CommentSort, ReactionAction, ReactionCounts,
    ReactionToggleResult,
};
pub use event_publisher::{
    CounterKind, EventPublisher, EventPublisherService, FeedEvent, NoOpEventPublisher,
};
pub use like::{LikeService, LikeState};
pub use notification::NotificationService;
pub use pagination::{PageRequest, Paginated};
pub use poll::{PollOptionResponse, PollService, VoteResult};
pub use post::{
    CreatePostInput, MediaUpload, PollPatch, PostResponse, PostService, QuizQuestionInput,
    QuizQuestionResponse, UpdatePostInput,
};
pub use user::{AuthorInfo, UserSearchResult, UserService};
pub use view::{PostAnalytics, TrackViewInput, ViewCounts, ViewService};
