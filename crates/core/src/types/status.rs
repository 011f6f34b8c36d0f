//! Change-feed subscription status.

use serde::{Deserialize, Serialize};

/// Status of a change-feed subscription.
///
/// Failures are reported through this value only; nothing retries. A
/// subscription in [`ChannelError`](Self::ChannelError),
/// [`TimedOut`](Self::TimedOut), or [`Closed`](Self::Closed) delivers no
/// further events until the view is mounted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Handshake in progress.
    #[default]
    Connecting,
    /// Attached and delivering events.
    Subscribed,
    /// The channel failed or fell behind and dropped events.
    ChannelError,
    /// The handshake did not complete in time.
    TimedOut,
    /// The subscription was closed.
    Closed,
}

impl SubscriptionStatus {
    /// Wire name, as sent in SSE `status` events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Subscribed => "SUBSCRIBED",
            Self::ChannelError => "CHANNEL_ERROR",
            Self::TimedOut => "TIMED_OUT",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether events can still arrive in this state.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Subscribed)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CONNECTING" => Ok(Self::Connecting),
            "SUBSCRIBED" => Ok(Self::Subscribed),
            "CHANNEL_ERROR" => Ok(Self::ChannelError),
            "TIMED_OUT" => Ok(Self::TimedOut),
            "CLOSED" => Ok(Self::Closed),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}
