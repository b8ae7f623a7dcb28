//! Server-Sent Events for real-time feed updates.
//!
//! [`SseBroadcaster`] is the API side of the core `EventPublisher`: services
//! publish into one broadcast channel and every `/streaming` connection
//! filters it for its viewer. Counter and comment events go to everyone,
//! notifications only to their recipient.

#![allow(missing_docs)]

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use campus_common::AppResult;
use campus_core::{CounterKind, EventPublisher, FeedEvent};
use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::{extractors::MaybeAuthUser, middleware::AppState};

const CHANNEL_CAPACITY: usize = 1000;

/// Fan-out of feed events to connected clients.
#[derive(Clone)]
pub struct SseBroadcaster {
    sender: broadcast::Sender<FeedEvent>,
}

impl SseBroadcaster {
    /// Create a new SSE broadcaster.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }

    /// Send to all subscribers. Having none is not an error.
    pub fn broadcast(&self, event: FeedEvent) {
        let name = event.name();
        if let Ok(receivers) = self.sender.send(event) {
            tracing::trace!(event = name, receivers = receivers, "Broadcast feed event");
        }
    }
}

impl Default for SseBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for SseBroadcaster {
    async fn publish_post_updated(
        &self,
        post_id: &str,
        kind: CounterKind,
        likes_count: Option<i32>,
        comments_count: Option<i32>,
        user_id: &str,
    ) -> AppResult<()> {
        self.broadcast(FeedEvent::PostUpdated {
            post_id: post_id.to_string(),
            kind,
            likes_count,
            comments_count,
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn publish_comment_added(
        &self,
        post_id: &str,
        user_id: &str,
        comment: serde_json::Value,
    ) -> AppResult<()> {
        self.broadcast(FeedEvent::CommentAdded {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            comment,
        });
        Ok(())
    }

    async fn publish_notification(
        &self,
        id: &str,
        user_id: &str,
        notification_type: &str,
        notifier_id: &str,
        post_id: &str,
    ) -> AppResult<()> {
        self.broadcast(FeedEvent::Notification {
            id: id.to_string(),
            user_id: user_id.to_string(),
            notification_type: notification_type.to_string(),
            notifier_id: notifier_id.to_string(),
            post_id: post_id.to_string(),
        });
        Ok(())
    }
}

/// Whether `viewer_id` should receive `event`.
fn is_visible_to(event: &FeedEvent, viewer_id: Option<&str>) -> bool {
    match event {
        FeedEvent::Notification { user_id, .. } => viewer_id == Some(user_id.as_str()),
        FeedEvent::PostUpdated { .. } | FeedEvent::CommentAdded { .. } => true,
    }
}

fn to_sse(event: &FeedEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|_| Event::default().data("error"))
}

/// Feed event stream.
pub async fn stream_handler(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer_id = user.map(|u| u.id);
    let rx = state.sse_broadcaster.subscribe();

    let events = BroadcastStream::new(rx).filter_map(move |result| {
        result
            .ok()
            .filter(|event| is_visible_to(event, viewer_id.as_deref()))
            .map(|event| Ok(to_sse(&event)))
    });

    let initial = stream::once(async { Ok(Event::default().event("connected").data("{}")) });

    Sse::new(initial.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn notification_for(user_id: &str) -> FeedEvent {
        FeedEvent::Notification {
            id: "n1".to_string(),
            user_id: user_id.to_string(),
            notification_type: "POST_LIKE".to_string(),
            notifier_id: "u1".to_string(),
            post_id: "p1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broadcaster = SseBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster
            .publish_post_updated("p1", CounterKind::Like, Some(1), None, "u1")
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "post:updated");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broadcaster = SseBroadcaster::new();
        assert!(
            broadcaster
                .publish_comment_added("p1", "u1", serde_json::json!({}))
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_notifications_only_reach_recipient() {
        let event = notification_for("u2");
        assert!(is_visible_to(&event, Some("u2")));
        assert!(!is_visible_to(&event, Some("u3")));
        assert!(!is_visible_to(&event, None));
    }

    #[test]
    fn test_counter_events_are_public() {
        let event = FeedEvent::PostUpdated {
            post_id: "p1".to_string(),
            kind: CounterKind::Unlike,
            likes_count: Some(0),
            comments_count: None,
            user_id: "u1".to_string(),
        };
        assert!(is_visible_to(&event, None));
    }
}
