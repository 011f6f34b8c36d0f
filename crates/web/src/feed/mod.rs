//! Change-feed hub.
//!
//! One [`ChangeFeed`] exists per process. A background task listens on the
//! `bookmark_changes` `PostgreSQL` channel (fed by the row trigger on
//! `bookmarks`), decodes each notification, stamps it with a sequence number,
//! and broadcasts it to every open [`Subscription`].
//!
//! The broadcast is not filtered by owner; each subscription filters for
//! itself. Nothing reconnects: if the listener fails the hub reports
//! `CHANNEL_ERROR`, every subscription ends with that status, and readiness
//! starts failing so the process gets replaced.
//!
//! ```text
//! bookmarks row trigger ──pg_notify──▶ listener task ──▶ broadcast ──▶ Subscription (owner A)
//!                                                              └──────▶ Subscription (owner B)
//! ```

mod subscription;

pub use subscription::{Delivery, Subscription};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use smart_bookmarks_core::{
    ChangeError, ChangeEvent, ChangePayload, FeedMessage, OwnerId, SubscriptionStatus,
};

/// Notification channel written by the `bookmarks_notify_change` trigger.
pub const CHANNEL: &str = "bookmark_changes";

/// How many recent events the hub keeps per owner for the diagnostic view.
const RECENT_EVENTS: usize = 10;

/// How many owners' recent events are kept; the owner with the stalest
/// latest event is forgotten first.
const RECENT_OWNERS: usize = 1024;

/// Errors from the database listener.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Connecting or listening failed, or the connection was lost.
    #[error("listener error: {0}")]
    Listener(#[from] sqlx::Error),

    /// The listener connection dropped; notifications may have been missed.
    #[error("listener connection lost")]
    ConnectionLost,

    /// A notification could not be decoded.
    #[error(transparent)]
    Decode(#[from] ChangeError),
}

/// Process-wide change-feed hub.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    sender: broadcast::Sender<FeedMessage>,
    status: watch::Sender<SubscriptionStatus>,
    sequence: AtomicU64,
    open: AtomicUsize,
    recent: Mutex<HashMap<OwnerId, VecDeque<FeedMessage>>>,
}

/// Push `message` onto its owner's ring, keeping at most [`RECENT_EVENTS`]
/// per owner and [`RECENT_OWNERS`] owners.
fn record_recent(recent: &mut HashMap<OwnerId, VecDeque<FeedMessage>>, message: &FeedMessage) {
    let owner = message.change.owner();
    if !recent.contains_key(&owner) && recent.len() >= RECENT_OWNERS {
        let stalest = recent
            .iter()
            .min_by_key(|(_, ring)| ring.front().map_or(0, |m| m.sequence))
            .map(|(owner, _)| *owner);
        if let Some(stalest) = stalest {
            recent.remove(&stalest);
        }
    }

    let ring = recent
        .entry(owner)
        .or_insert_with(|| VecDeque::with_capacity(RECENT_EVENTS));
    if ring.len() == RECENT_EVENTS {
        ring.pop_back();
    }
    ring.push_front(message.clone());
}

impl FeedInner {
    fn release(&self) {
        let remaining = self.open.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        tracing::debug!(open_subscriptions = remaining, "Subscription released");
    }
}

impl ChangeFeed {
    /// Create a hub whose subscribers may fall at most `capacity` events behind.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (status, _) = watch::channel(SubscriptionStatus::Connecting);

        Self {
            inner: Arc::new(FeedInner {
                sender,
                status,
                sequence: AtomicU64::new(0),
                open: AtomicUsize::new(0),
                recent: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Open a subscription scoped to `owner`.
    ///
    /// The handle must be kept for as long as the view is mounted; dropping
    /// it (or calling [`Subscription::close`]) releases it.
    #[must_use]
    pub fn subscribe(&self, owner: OwnerId) -> Subscription {
        let open = self.inner.open.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(owner = %owner, open_subscriptions = open, "Subscription opened");

        Subscription::new(
            owner,
            self.inner.sender.subscribe(),
            self.inner.status.subscribe(),
            Arc::clone(&self.inner),
        )
    }

    /// Stamp and broadcast a change.
    ///
    /// Having no subscribers is not an error; the event is still recorded in
    /// its owner's recent-events ring.
    pub fn publish(&self, change: ChangeEvent) -> FeedMessage {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let message = FeedMessage { sequence, change };

        record_recent(
            &mut self
                .inner
                .recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            &message,
        );

        let receivers = self.inner.sender.send(message.clone()).unwrap_or(0);
        tracing::debug!(
            sequence,
            kind = %message.change.kind,
            bookmark_id = %message.change.id(),
            receivers,
            "Change published"
        );
        message
    }

    /// Current hub status.
    #[must_use]
    pub fn status(&self) -> SubscriptionStatus {
        *self.inner.status.borrow()
    }

    /// Record a hub status change; terminal states end every subscription.
    pub fn set_status(&self, status: SubscriptionStatus) {
        let previous = self.inner.status.send_replace(status);
        if previous != status {
            tracing::info!(from = %previous, to = %status, "Change feed status changed");
        }
    }

    /// Number of subscriptions currently open.
    #[must_use]
    pub fn open_subscriptions(&self) -> usize {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Up to ten most recent events for `owner`, newest first.
    #[must_use]
    pub fn recent_for(&self, owner: OwnerId) -> Vec<FeedMessage> {
        self.inner
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Close the hub (graceful shutdown).
    pub fn shutdown(&self) {
        self.set_status(SubscriptionStatus::Closed);
    }

    /// Start the database listener in the background.
    ///
    /// The task runs until the listener fails or the hub is shut down.
    pub fn spawn_listener(&self, pool: PgPool) -> JoinHandle<()> {
        let feed = self.clone();
        tokio::spawn(async move {
            match feed.run_listener(&pool).await {
                Ok(()) => tracing::info!("Change feed listener stopped"),
                Err(e) => {
                    tracing::error!(error = %e, "Change feed listener failed");
                    feed.set_status(SubscriptionStatus::ChannelError);
                }
            }
        })
    }

    async fn run_listener(&self, pool: &PgPool) -> Result<(), FeedError> {
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(CHANNEL).await?;
        self.set_status(SubscriptionStatus::Subscribed);
        tracing::info!(channel = CHANNEL, "Change feed listening");

        let mut status = self.inner.status.subscribe();
        loop {
            tokio::select! {
                notification = listener.try_recv() => {
                    let Some(notification) = notification? else {
                        return Err(FeedError::ConnectionLost);
                    };
                    if let Err(e) = self.handle_payload(notification.payload()) {
                        tracing::warn!(error = %e, "Dropping undecodable change notification");
                    }
                }
                changed = status.changed() => {
                    if changed.is_err() || *status.borrow_and_update() == SubscriptionStatus::Closed {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decode one raw notification and publish it.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::Decode` if the payload is malformed.
    pub fn handle_payload(&self, payload: &str) -> Result<FeedMessage, FeedError> {
        let change = ChangeEvent::try_from(ChangePayload::from_json(payload)?)?;
        Ok(self.publish(change))
    }
}
