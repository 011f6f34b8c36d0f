//! Terminal watcher for the live bookmark feed.
//!
//! # Usage
//!
//! ```bash
//! sb-cli watch --base-url https://bookmarks.example.com --session <sb_session cookie>
//! ```
//!
//! Opens the change stream, loads the snapshot, and reprints the list after
//! every change that alters it. Events that arrive before the snapshot are
//! held and applied after it. There is no reconnect: a failed or closed
//! stream ends the command.

mod sse;

pub use sse::{SseError, SseFrame, frames};

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use smart_bookmarks_core::{Bookmark, FeedMessage, OwnerId, Reconciler, SubscriptionStatus};

/// Cookie carrying the web server's session id.
const SESSION_COOKIE_NAME: &str = "sb_session";

/// Errors from the watch command.
#[derive(Debug, Error)]
pub enum WatchError {
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server refused the request (usually an expired session).
    #[error("server returned {0}")]
    Rejected(reqwest::StatusCode),

    /// The session value cannot be sent as a header.
    #[error("session value is not a valid cookie")]
    InvalidSession,

    /// The stream broke.
    #[error(transparent)]
    Stream(#[from] SseError),

    /// A change event did not decode.
    #[error("malformed change event: {0}")]
    Decode(#[from] serde_json::Error),

    /// No `SUBSCRIBED` status arrived in time.
    #[error("no subscription confirmation within {0:?}")]
    TimedOut(Duration),

    /// The feed ended with a failure status.
    #[error("change feed ended with {0}")]
    Feed(SubscriptionStatus),
}

/// Options for [`run`].
pub struct WatchOptions {
    /// Server base URL, without trailing slash.
    pub base_url: String,
    /// Value of the session cookie.
    pub session: SecretString,
    /// How long to wait for `SUBSCRIBED`.
    pub handshake_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Diagnostics {
    owner_id: OwnerId,
}

/// What the stream handed us.
#[derive(Debug)]
enum Signal {
    Status(SubscriptionStatus),
    Change(FeedMessage),
}

fn decode(frame: &SseFrame) -> Result<Option<Signal>, WatchError> {
    match frame.event.as_deref() {
        Some("status") => Ok(frame.data.parse().ok().map(Signal::Status)),
        Some("change") => Ok(Some(Signal::Change(serde_json::from_str(&frame.data)?))),
        _ => Ok(None),
    }
}

fn client(session: &SecretString) -> Result<reqwest::Client, WatchError> {
    let cookie = format!("{SESSION_COOKIE_NAME}={}", session.expose_secret());
    let mut value = HeaderValue::from_str(&cookie).map_err(|_| WatchError::InvalidSession)?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, value);

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, WatchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(WatchError::Rejected(response.status()));
    }
    Ok(response.json().await?)
}

/// Wait for `SUBSCRIBED`, holding any changes that arrive first.
async fn handshake<S>(stream: &mut S, pending: &mut Vec<FeedMessage>) -> Result<(), WatchError>
where
    S: Stream<Item = Result<SseFrame, SseError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match decode(&frame?)? {
            Some(Signal::Status(SubscriptionStatus::Subscribed)) => return Ok(()),
            Some(Signal::Status(status)) if !status.is_live() => {
                return Err(WatchError::Feed(status));
            }
            Some(Signal::Change(message)) => pending.push(message),
            Some(Signal::Status(_)) | None => {}
        }
    }
    Err(WatchError::Feed(SubscriptionStatus::Closed))
}

/// Render the tracked list for the terminal.
#[must_use]
pub fn render(bookmarks: &[Bookmark]) -> String {
    if bookmarks.is_empty() {
        return "  (no bookmarks)\n".to_string();
    }
    bookmarks
        .iter()
        .map(|b| format!("  {}  {}  <{}>\n", b.created_at.format("%b %-d, %Y"), b.title, b.url))
        .collect()
}

#[allow(clippy::print_stdout)]
fn report_status(status: SubscriptionStatus) {
    println!("status: {status}");
}

#[allow(clippy::print_stdout)]
fn print_list(reconciler: &Reconciler) {
    println!("{} bookmark(s)\n{}", reconciler.len(), render(reconciler.bookmarks()));
}

/// Watch the feed until it ends.
///
/// # Errors
///
/// Returns `WatchError::TimedOut` if the subscription is not confirmed in
/// time, `WatchError::Feed` if it fails, or a transport error.
pub async fn run(options: WatchOptions) -> Result<(), WatchError> {
    let client = client(&options.session)?;
    let base = options.base_url.trim_end_matches('/');

    let response = client
        .get(format!("{base}/api/bookmarks/events"))
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(WatchError::Rejected(response.status()));
    }
    let mut stream = std::pin::pin!(frames(response.bytes_stream()));

    report_status(SubscriptionStatus::Connecting);
    let mut pending = Vec::new();
    match tokio::time::timeout(
        options.handshake_timeout,
        handshake(&mut stream, &mut pending),
    )
    .await
    {
        Ok(Ok(())) => report_status(SubscriptionStatus::Subscribed),
        Ok(Err(e)) => {
            if let WatchError::Feed(status) = &e {
                report_status(*status);
            }
            return Err(e);
        }
        Err(_) => {
            report_status(SubscriptionStatus::TimedOut);
            return Err(WatchError::TimedOut(options.handshake_timeout));
        }
    }

    let owner = get_json::<Diagnostics>(&client, &format!("{base}/api/diagnostics/realtime"))
        .await?
        .owner_id;
    let snapshot: Vec<Bookmark> = get_json(&client, &format!("{base}/api/bookmarks")).await?;

    let mut reconciler = Reconciler::new(owner, snapshot);
    for message in pending {
        reconciler.apply(&message.change);
    }
    print_list(&reconciler);

    let mut last_sequence = None;
    while let Some(frame) = stream.next().await {
        match decode(&frame?)? {
            Some(Signal::Change(message)) => {
                if let Some(last) = last_sequence
                    && message.sequence != last + 1
                {
                    tracing::warn!(last, next = message.sequence, "Gap in change sequence");
                }
                last_sequence = Some(message.sequence);

                let outcome = reconciler.apply(&message.change);
                tracing::debug!(sequence = message.sequence, ?outcome, "Change applied");
                if !outcome.is_ignored() {
                    print_list(&reconciler);
                }
            }
            Some(Signal::Status(status)) => {
                report_status(status);
                if !status.is_live() {
                    return match status {
                        SubscriptionStatus::Closed => Ok(()),
                        _ => Err(WatchError::Feed(status)),
                    };
                }
            }
            None => {}
        }
    }

    report_status(SubscriptionStatus::Closed);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::stream;

    use super::*;

    fn frame(event: &str, data: &str) -> Result<SseFrame, SseError> {
        Ok(SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
            id: None,
        })
    }

    const CHANGE: &str = r#"{"sequence":3,"kind":"insert","record":{
        "id":"0b6f3c1e-8c9a-4a57-9f0e-3f2d5d1c7a10",
        "user_id":"7d1c2a4e-1111-4a57-9f0e-3f2d5d1c7a10",
        "title":"A","url":"https://a.com",
        "created_at":"2026-01-02T03:04:05+00:00","version":1}}"#;

    #[test]
    fn test_decode_frames() {
        let status = decode(&frame("status", "SUBSCRIBED").unwrap()).unwrap();
        assert!(matches!(
            status,
            Some(Signal::Status(SubscriptionStatus::Subscribed))
        ));

        let change = decode(&frame("change", CHANGE).unwrap()).unwrap();
        assert!(matches!(change, Some(Signal::Change(m)) if m.sequence == 3));

        assert!(decode(&frame("message", "hi").unwrap()).unwrap().is_none());
        assert!(decode(&frame("change", "{").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_handshake_holds_early_changes() {
        let mut frames = stream::iter(vec![
            frame("status", "CONNECTING"),
            frame("change", CHANGE),
            frame("status", "SUBSCRIBED"),
        ]);
        let mut pending = Vec::new();

        handshake(&mut frames, &mut pending).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_handshake_fails_on_channel_error_or_end() {
        let mut failed = stream::iter(vec![frame("status", "CHANNEL_ERROR")]);
        assert!(matches!(
            handshake(&mut failed, &mut Vec::new()).await,
            Err(WatchError::Feed(SubscriptionStatus::ChannelError))
        ));

        let mut ended = stream::iter(Vec::<Result<SseFrame, SseError>>::new());
        assert!(matches!(
            handshake(&mut ended, &mut Vec::new()).await,
            Err(WatchError::Feed(SubscriptionStatus::Closed))
        ));
    }

    #[tokio::test]
    async fn test_handshake_times_out_on_silent_stream() {
        let mut silent = stream::pending::<Result<SseFrame, SseError>>();
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            handshake(&mut silent, &mut Vec::new()),
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&[]), "  (no bookmarks)\n");

        let message: FeedMessage = serde_json::from_str(CHANGE).unwrap();
        let line = render(&[message.change.record]);
        assert_eq!(line, "  Jan 2, 2026  A  <https://a.com>\n");
    }
}
