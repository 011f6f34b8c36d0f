//! Bookmark API: snapshot, create, delete, and the live change feed.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::instrument;

use smart_bookmarks_core::{Bookmark, BookmarkId, FeedMessage, NewBookmark, SubscriptionStatus};

use crate::db::BookmarkRepository;
use crate::error::Result;
use crate::feed::{Delivery, Subscription};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// SSE event name for status transitions.
pub const STATUS_EVENT: &str = "status";
/// SSE event name for row changes.
pub const CHANGE_EVENT: &str = "change";

/// Create request body.
#[derive(Debug, Deserialize)]
pub struct CreateBookmark {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Snapshot of the owner's bookmarks, newest first.
///
/// # Route
///
/// `GET /api/bookmarks`
#[instrument(skip_all, fields(owner = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Bookmark>>> {
    let bookmarks = BookmarkRepository::new(state.pool())
        .list_for_owner(user.id)
        .await?;
    Ok(Json(bookmarks))
}

/// Create a bookmark.
///
/// Responds 400 with the validation message, or 201 with the stored record.
///
/// # Route
///
/// `POST /api/bookmarks`
#[instrument(skip_all, fields(owner = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateBookmark>,
) -> Result<Response> {
    let draft = NewBookmark::parse(&body.title, &body.url)?;
    let bookmark = BookmarkRepository::new(state.pool())
        .create(user.id, &draft)
        .await?;

    tracing::info!(bookmark_id = %bookmark.id, "Bookmark added");
    Ok((StatusCode::CREATED, Json(bookmark)).into_response())
}

/// Delete a bookmark. Idempotent.
///
/// # Route
///
/// `DELETE /api/bookmarks/{id}`
#[instrument(skip_all, fields(owner = %user.id, bookmark_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookmarkId>,
) -> Result<StatusCode> {
    BookmarkRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stream the owner's changes as Server-Sent Events.
///
/// The subscription lives exactly as long as the response stream; a client
/// disconnect drops it.
///
/// # Route
///
/// `GET /api/bookmarks/events`
pub async fn events(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let subscription = state.feed().subscribe(user.id);
    tracing::info!(owner = %user.id, status = %subscription.status(), "Change stream opened");

    let events = frames(subscription).map(|frame| Ok(frame.into_event()));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// One SSE frame before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: &'static str,
    pub id: Option<u64>,
    pub data: String,
}

impl Frame {
    fn status(status: SubscriptionStatus) -> Self {
        Self {
            event: STATUS_EVENT,
            id: None,
            data: status.as_str().to_string(),
        }
    }

    fn change(message: &FeedMessage) -> Option<Self> {
        match serde_json::to_string(message) {
            Ok(data) => Some(Self {
                event: CHANGE_EVENT,
                id: Some(message.sequence),
                data,
            }),
            Err(e) => {
                tracing::warn!(error = %e, sequence = message.sequence, "Failed to encode change");
                None
            }
        }
    }

    fn into_event(self) -> Event {
        let event = Event::default().event(self.event).data(self.data);
        match self.id {
            Some(id) => event.id(id.to_string()),
            None => event,
        }
    }
}

/// Turn a subscription into SSE frames.
///
/// The first frame is always the current status; the last is the terminal
/// status when the subscription ends.
pub fn frames(mut subscription: Subscription) -> impl Stream<Item = Frame> {
    stream! {
        let initial = subscription.status();
        yield Frame::status(initial);
        if !initial.is_live() {
            return;
        }

        while let Some(delivery) = subscription.next().await {
            match delivery {
                Delivery::Change(message) => {
                    if let Some(frame) = Frame::change(&message) {
                        yield frame;
                    }
                }
                Delivery::Status(status) => yield Frame::status(status),
            }
        }

        tracing::debug!(owner = %subscription.owner(), status = %subscription.status(), "Change stream ended");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::{StreamExt, pin_mut};
    use smart_bookmarks_core::{ChangeKind, OwnerId};
    use uuid::Uuid;

    use super::*;
    use crate::feed::ChangeFeed;
    use crate::feed::tests::change;

    #[tokio::test]
    async fn test_frames_status_then_changes_then_terminal() {
        let owner = OwnerId::new(Uuid::from_u128(1));
        let feed = ChangeFeed::new(8);
        feed.set_status(SubscriptionStatus::Subscribed);

        let stream = frames(feed.subscribe(owner));
        pin_mut!(stream);

        assert_eq!(stream.next().await, Some(Frame::status(SubscriptionStatus::Subscribed)));

        let message = feed.publish(change(ChangeKind::Insert, owner, 7));
        let frame = stream.next().await.unwrap();
        assert_eq!(frame.event, CHANGE_EVENT);
        assert_eq!(frame.id, Some(message.sequence));
        let decoded: FeedMessage = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(decoded, message);

        feed.set_status(SubscriptionStatus::ChannelError);
        assert_eq!(
            stream.next().await,
            Some(Frame::status(SubscriptionStatus::ChannelError))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_frames_after_hub_failure_end_immediately() {
        let feed = ChangeFeed::new(8);
        feed.set_status(SubscriptionStatus::ChannelError);

        let stream = frames(feed.subscribe(OwnerId::new(Uuid::nil())));
        pin_mut!(stream);

        assert_eq!(
            stream.next().await,
            Some(Frame::status(SubscriptionStatus::ChannelError))
        );
        assert_eq!(stream.next().await, None);
    }
}
