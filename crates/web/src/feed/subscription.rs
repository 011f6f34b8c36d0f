//! Per-consumer subscription handle.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use smart_bookmarks_core::{FeedMessage, OwnerId, SubscriptionStatus};

use super::FeedInner;

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A change to one of the owner's bookmarks.
    Change(FeedMessage),
    /// The subscription's status changed.
    Status(SubscriptionStatus),
}

/// A live subscription to the change feed, scoped to one owner.
///
/// Only events whose record belongs to the owner are delivered. Once the
/// status turns terminal the subscription yields that status once and then
/// nothing more; it never resubscribes.
pub struct Subscription {
    owner: OwnerId,
    status: SubscriptionStatus,
    receiver: broadcast::Receiver<FeedMessage>,
    hub_status: watch::Receiver<SubscriptionStatus>,
    feed: Arc<FeedInner>,
    finished: bool,
}

impl Subscription {
    pub(super) fn new(
        owner: OwnerId,
        receiver: broadcast::Receiver<FeedMessage>,
        mut hub_status: watch::Receiver<SubscriptionStatus>,
        feed: Arc<FeedInner>,
    ) -> Self {
        let status = *hub_status.borrow_and_update();
        Self {
            owner,
            status,
            receiver,
            hub_status,
            feed,
            finished: false,
        }
    }

    /// Owner this subscription is scoped to.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SubscriptionStatus {
        self.status
    }

    /// Wait for the next delivery.
    ///
    /// Returns `None` once the terminal status has been reported.
    pub async fn next(&mut self) -> Option<Delivery> {
        if self.finished {
            return None;
        }
        if !self.status.is_live() {
            return Some(self.finish(self.status));
        }

        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Ok(message) if message.change.owner() == self.owner => {
                        return Some(Delivery::Change(message));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(owner = %self.owner, missed, "Subscriber fell behind the change feed");
                        return Some(self.finish(SubscriptionStatus::ChannelError));
                    }
                    Err(RecvError::Closed) => {
                        return Some(self.finish(SubscriptionStatus::Closed));
                    }
                },
                changed = self.hub_status.changed() => {
                    let status = if changed.is_ok() {
                        *self.hub_status.borrow_and_update()
                    } else {
                        SubscriptionStatus::Closed
                    };
                    if status == self.status {
                        continue;
                    }
                    if !status.is_live() {
                        return Some(self.finish(status));
                    }
                    self.status = status;
                    return Some(Delivery::Status(status));
                }
            }
        }
    }

    /// Release the subscription.
    pub fn close(self) {
        tracing::debug!(owner = %self.owner, "Subscription closed");
    }

    fn finish(&mut self, status: SubscriptionStatus) -> Delivery {
        self.status = status;
        self.finished = true;
        Delivery::Status(status)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feed.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("owner", &self.owner)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
