//! campus-feed server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use campus_api::{AppState, SseBroadcaster, router as api_router};
use campus_common::{Config, LocalStorage, StorageService};
use campus_core::{
    BookmarkService, CommentService, EventPublisherService, LikeService, NotificationService, PollService,
    PostService, UserService, ViewService,
};
use campus_db::repositories::{
    BookmarkRepository, CommentReactionRepository, CommentRepository, NotificationRepository, PollRepository,
    PostLikeRepository, PostRepository, PostViewRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str =
    "campus_feed=debug,campus_api=debug,campus_core=debug,campus_db=info,tower_http=debug";

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    info!("Starting campus-feed server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(campus_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    campus_db::migrate(&db).await?;
    info!("Migrations completed");

    // Media storage
    let storage: StorageService = Arc::new(LocalStorage::new(
        config.storage.base_path.clone(),
        config.storage.base_url.clone(),
    ));

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let like_repo = PostLikeRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let reaction_repo = CommentReactionRepository::new(Arc::clone(&db));
    let view_repo = PostViewRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let bookmark_repo = BookmarkRepository::new(Arc::clone(&db));

    // Real-time events
    let sse_broadcaster = SseBroadcaster::new();
    let event_publisher: EventPublisherService = Arc::new(sse_broadcaster.clone());

    // Initialize services
    let user_service = UserService::new(user_repo);

    let mut notification_service = NotificationService::new(notification_repo);
    notification_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut like_service = LikeService::new(like_repo.clone(), post_repo.clone());
    like_service.set_notification_service(notification_service.clone());
    like_service.set_event_publisher(Arc::clone(&event_publisher));

    let mut comment_service = CommentService::new(
        comment_repo,
        reaction_repo,
        post_repo.clone(),
        user_service.clone(),
    );
    comment_service.set_notification_service(notification_service.clone());
    comment_service.set_event_publisher(Arc::clone(&event_publisher));

    let post_service = PostService::new(
        post_repo.clone(),
        poll_repo.clone(),
        like_repo,
        user_service.clone(),
        storage,
    );
    let bookmark_service =
        BookmarkService::new(bookmark_repo, post_repo.clone(), post_service.clone());
    let poll_service = PollService::new(poll_repo, post_repo.clone());
    let view_service = ViewService::new(view_repo, post_repo, user_service.clone());

    let state = AppState {
        user_service,
        post_service,
        like_service,
        comment_service,
        poll_service,
        view_service,
        bookmark_service,
        notification_service,
        sse_broadcaster,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .nest_service(
            &config.storage.base_url,
            ServeDir::new(&config.storage.base_path),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            campus_api::middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
