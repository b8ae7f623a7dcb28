//! API integration tests.
//!
//! These tests drive the full router, auth middleware included, against
//! mock databases.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware,
};
use campus_api::{AppState, SseBroadcaster, middleware::auth_middleware, router as api_router};
use campus_common::NoOpStorage;
use campus_core::{
    BookmarkService, CommentService, LikeService, NotificationService, PollService, PostService, UserService,
    ViewService,
};
use campus_db::{
    entities::{
        bookmark, comment,
        comment_reaction::{self, ReactionType},
        notification::{self, NotificationType},
        poll_option, post,
        post::{PostType, Visibility},
        post_like,
        user::{self, UserRole},
    },
    repositories::{
        BookmarkRepository, CommentReactionRepository, CommentRepository, NotificationRepository, PollRepository,
        PostLikeRepository, PostRepository, PostViewRepository, UserRepository,
    },
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
use serde_json::json;
use tower::ServiceExt;

const TOKEN: &str = "secret-token";

fn mock_db() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

fn create_test_user(id: &str, role: UserRole) -> user::Model {
    user::Model {
        id: id.to_string(),
        first_name: "Mina".to_string(),
        last_name: "Cho".to_string(),
        localized_name: None,
        avatar_url: None,
        role,
        subtitle: Some("Grade 10".to_string()),
        token: Some(TOKEN.to_string()),
        created_at: Utc::now().into(),
    }
}

fn create_test_post(id: &str, author_id: &str, visibility: Visibility) -> post::Model {
    post::Model {
        id: id.to_string(),
        author_id: author_id.to_string(),
        content: "Library closes early today".to_string(),
        post_type: PostType::Announcement,
        visibility,
        media: json!([]),
        details: json!({ "postType": "ANNOUNCEMENT", "announcementUrgency": "high" }),
        is_pinned: false,
        is_edited: false,
        likes_count: 0,
        comments_count: 0,
        shares_count: 0,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
}

/// Mock databases backing one test app. Each repository gets its own queue.
#[derive(Default)]
struct Dbs {
    users: Option<MockDatabase>,
    posts: Option<MockDatabase>,
    polls: Option<MockDatabase>,
    likes: Option<MockDatabase>,
    comments: Option<MockDatabase>,
    reactions: Option<MockDatabase>,
    bookmarks: Option<MockDatabase>,
    notifications: Option<MockDatabase>,
}

fn conn(db: Option<MockDatabase>) -> Arc<DatabaseConnection> {
    Arc::new(db.unwrap_or_else(mock_db).into_connection())
}

/// Build the app the way the server binary does.
fn create_test_app(dbs: Dbs) -> Router {
    let user_repo = UserRepository::new(conn(dbs.users));
    let post_repo = PostRepository::new(conn(dbs.posts));
    let poll_repo = PollRepository::new(conn(dbs.polls));
    let like_repo = PostLikeRepository::new(conn(dbs.likes));
    let notification_repo = NotificationRepository::new(conn(dbs.notifications));

    let user_service = UserService::new(user_repo);
    let post_service = PostService::new(
        post_repo.clone(),
        poll_repo.clone(),
        like_repo.clone(),
        user_service.clone(),
        Arc::new(NoOpStorage),
    );
    let state = AppState {
        user_service: user_service.clone(),
        post_service: post_service.clone(),
        like_service: LikeService::new(like_repo, post_repo.clone()),
        comment_service: CommentService::new(
            CommentRepository::new(conn(dbs.comments)),
            CommentReactionRepository::new(conn(dbs.reactions)),
            post_repo.clone(),
            user_service.clone(),
        ),
        poll_service: PollService::new(poll_repo, post_repo.clone()),
        view_service: ViewService::new(
            PostViewRepository::new(conn(None)),
            post_repo.clone(),
            user_service,
        ),
        bookmark_service: BookmarkService::new(
            BookmarkRepository::new(conn(dbs.bookmarks)),
            post_repo,
            post_service,
        ),
        notification_service: NotificationService::new(notification_repo),
        sse_broadcaster: SseBroadcaster::new(),
    };

    Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// User DB that authenticates the bearer token as `user`.
fn users_authenticating(user: user::Model) -> MockDatabase {
    mock_db().append_query_results([[user]])
}

fn json_body(value: &serde_json::Value) -> Body {
    Body::from(serde_json::to_vec(value).unwrap())
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_feed_requires_auth() {
    let app = create_test_app(Dbs::default());

    let response = app
        .oneshot(Request::builder().uri("/api/posts").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_feed_page_with_author_and_pagination() {
    let viewer = create_test_user("viewer", UserRole::Student);
    let author = create_test_user("teacher1", UserRole::Teacher);

    let app = create_test_app(Dbs {
        users: Some(
            users_authenticating(viewer)
                .append_query_results([[author]]),
        ),
        posts: Some(
            mock_db()
                .append_query_results([[create_test_post("p1", "teacher1", Visibility::School)]])
                .append_query_results([[count_row(11)]]),
        ),
        likes: Some(mock_db().append_query_results([Vec::<post_like::Model>::new()])),
        ..Dbs::default()
    });

    let response = app
        .oneshot(
            authed("GET", "/api/posts?page=1&limit=10&postType=ALL")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["id"], "p1");
    assert_eq!(body["data"][0]["postType"], "ANNOUNCEMENT");
    assert_eq!(body["data"][0]["announcementUrgency"], "high");
    assert_eq!(body["data"][0]["author"]["id"], "teacher1");
    assert_eq!(body["data"][0]["isLiked"], false);
    assert_eq!(body["pagination"]["total"], 11);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["hasMore"], true);
}

#[tokio::test]
async fn test_feed_rejects_unknown_post_type() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("u1", UserRole::Student))),
        ..Dbs::default()
    });

    let response = app
        .oneshot(
            authed("GET", "/api/posts?postType=GOSSIP")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_poll_with_single_option_is_rejected() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("u1", UserRole::Teacher))),
        ..Dbs::default()
    });

    let payload = json!({
        "content": "Which day for the field trip?",
        "postType": "POLL",
        "pollOptions": ["Friday"],
    });

    let response = app
        .oneshot(
            authed("POST", "/api/posts")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Poll must have between 2 and 10 options");
}

#[tokio::test]
async fn test_create_article_from_multipart() {
    let author = create_test_user("u1", UserRole::Teacher);
    let stored = post::Model {
        post_type: PostType::Article,
        details: json!({ "postType": "ARTICLE" }),
        media: json!([{ "url": "/files/posts/u1/a.png", "key": "posts/u1/a.png" }]),
        ..create_test_post("p9", "u1", Visibility::School)
    };

    let app = create_test_app(Dbs {
        users: Some(users_authenticating(author)),
        posts: Some(mock_db().append_query_results([[stored]])),
        ..Dbs::default()
    });

    let boundary = "XBOUNDARY";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nLab safety rules\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"postType\"\r\n\r\nARTICLE\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"a.png\"\r\n\
         Content-Type: image/png\r\n\r\nPNGDATA\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .oneshot(
            authed("POST", "/api/posts")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], "p9");
    assert_eq!(body["data"]["mediaUrls"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["mediaKeys"].as_array().unwrap().len(), 1);
    assert_eq!(body["message"], "Post created successfully");
}

#[tokio::test]
async fn test_delete_someone_elses_post_is_forbidden() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        posts: Some(
            mock_db().append_query_results([[create_test_post("p1", "owner", Visibility::Public)]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("DELETE", "/api/posts/p1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_private_post_of_other_author_is_not_found() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        posts: Some(
            mock_db()
                .append_query_results([[create_test_post("p1", "owner", Visibility::Private)]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("GET", "/api/posts/p1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vote_on_unknown_option() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        polls: Some(mock_db().append_query_results([Vec::<poll_option::Model>::new()])),
        ..Dbs::default()
    });

    let response = app
        .oneshot(
            authed("POST", "/api/polls/missing/vote")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_react_with_type_field() {
    let now = Utc::now();
    let target = comment::Model {
        id: "c1".to_string(),
        post_id: "p1".to_string(),
        author_id: "owner".to_string(),
        parent_id: None,
        content: "See you there".to_string(),
        created_at: now.into(),
        updated_at: now.into(),
    };
    let like = comment_reaction::Model {
        id: "r1".to_string(),
        comment_id: "c1".to_string(),
        user_id: "s1".to_string(),
        reaction_type: ReactionType::Like,
        created_at: now.into(),
    };

    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        posts: Some(
            mock_db().append_query_results([[create_test_post("p1", "owner", Visibility::School)]]),
        ),
        comments: Some(mock_db().append_query_results([[target]])),
        reactions: Some(
            mock_db()
                .append_query_results([Vec::<comment_reaction::Model>::new()])
                .append_query_results([[like.clone()]])
                // Tuple rows decode by position; keys sort in column order.
                .append_query_results([[BTreeMap::from([
                    ("comment_id", Value::from("c1")),
                    ("reaction_type", Value::from("LIKE")),
                    ("tally", Value::BigInt(Some(1))),
                ])]])
                .append_query_results([[like]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(
            authed("POST", "/api/comments/c1/react")
                .header(header::CONTENT_TYPE, "application/json")
                .body(json_body(&json!({ "type": "LIKE" })))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["action"], "added");
    assert_eq!(body["data"]["reactionType"], "LIKE");
    assert_eq!(body["data"]["userReactions"], json!(["LIKE"]));
}

#[tokio::test]
async fn test_bookmark_toggle_adds() {
    let saved = bookmark::Model {
        id: "b1".to_string(),
        post_id: "p1".to_string(),
        user_id: "s1".to_string(),
        created_at: Utc::now().into(),
    };

    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        posts: Some(
            mock_db().append_query_results([[create_test_post("p1", "owner", Visibility::School)]]),
        ),
        bookmarks: Some(
            mock_db()
                .append_query_results([Vec::<bookmark::Model>::new()])
                .append_query_results([[saved]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("POST", "/api/posts/p1/bookmark").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["bookmarked"], true);
    assert_eq!(body["message"], "Post bookmarked");
}

#[tokio::test]
async fn test_list_bookmarks() {
    let me = create_test_user("s1", UserRole::Student);
    let saved = bookmark::Model {
        id: "b1".to_string(),
        post_id: "p1".to_string(),
        user_id: "s1".to_string(),
        created_at: Utc::now().into(),
    };
    let mut post = create_test_post("p1", "owner", Visibility::School);
    post.shares_count = 2;

    let app = create_test_app(Dbs {
        users: Some(
            users_authenticating(me)
                .append_query_results([[create_test_user("owner", UserRole::Teacher)]]),
        ),
        posts: Some(mock_db().append_query_results([[post]])),
        likes: Some(mock_db().append_query_results([Vec::<post_like::Model>::new()])),
        bookmarks: Some(
            mock_db()
                .append_query_results([[saved]])
                .append_query_results([[count_row(1)]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("GET", "/api/bookmarks?limit=10").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["id"], "p1");
    assert_eq!(body["data"][0]["isBookmarked"], true);
    assert_eq!(body["data"][0]["sharesCount"], 2);
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_share_private_post_of_other_author_is_not_found() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        posts: Some(
            mock_db()
                .append_query_results([[create_test_post("p1", "owner", Visibility::Private)]]),
        ),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("POST", "/api/posts/p1/share").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_short_user_search_returns_empty_list() {
    let app = create_test_app(Dbs {
        users: Some(users_authenticating(create_test_user("s1", UserRole::Student))),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("GET", "/api/search/users?q=%20a%20").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_list_notifications() {
    let me = create_test_user("u2", UserRole::Teacher);
    let row = notification::Model {
        id: "n1".to_string(),
        notifiee_id: "u2".to_string(),
        notifier_id: "u1".to_string(),
        notification_type: NotificationType::PostLike,
        post_id: "p1".to_string(),
        comment_id: None,
        is_read: false,
        created_at: Utc::now().into(),
    };

    let app = create_test_app(Dbs {
        users: Some(users_authenticating(me)),
        notifications: Some(mock_db().append_query_results([[row]])),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("GET", "/api/notifications?limit=5").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["type"], "POST_LIKE");
    assert_eq!(body["data"][0]["notifierId"], "u1");
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = create_test_app(Dbs {
        users: Some(mock_db().append_query_results([Vec::<user::Model>::new()])),
        ..Dbs::default()
    });

    let response = app
        .oneshot(authed("GET", "/api/notifications").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app(Dbs::default());

    let response = app
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
