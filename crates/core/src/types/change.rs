//! Row-level change events.
//!
//! The store emits one notification per inserted, updated, or deleted
//! bookmark row. The raw notification ([`ChangePayload`]) carries before and
//! after row images; [`ChangeEvent`] is the decoded form consumers apply, and
//! [`FeedMessage`] is what travels to subscribers.

use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;
use super::id::{BookmarkId, OwnerId};

/// The kind of row change.
///
/// Serialized lowercase on the subscriber wire; the store's uppercase
/// `TG_OP` spelling is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    #[serde(alias = "INSERT")]
    Insert,
    #[serde(alias = "UPDATE")]
    Update,
    #[serde(alias = "DELETE")]
    Delete,
}

impl ChangeKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors decoding a raw change notification.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    /// Payload was not valid JSON or did not match the row shape.
    #[error("malformed change payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The row image required by the kind was absent.
    #[error("{kind} notification is missing its {image} row image")]
    MissingImage {
        /// Kind of the notification.
        kind: ChangeKind,
        /// Which image was expected (`new` or `old`).
        image: &'static str,
    },
}

/// A raw notification as emitted by the store trigger.
///
/// `new` is present for inserts and updates, `old` for deletes.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePayload {
    /// Operation that produced the notification.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Row image after the change.
    #[serde(default)]
    pub new: Option<Bookmark>,
    /// Row image before the change.
    #[serde(default)]
    pub old: Option<Bookmark>,
}

impl ChangePayload {
    /// Parse a notification body.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError::Malformed`] if the JSON does not decode.
    pub fn from_json(payload: &str) -> Result<Self, ChangeError> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// A decoded change: its kind and the affected record.
///
/// For inserts and updates the record is the new row image; for deletes it is
/// the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// The affected row.
    pub record: Bookmark,
}

impl ChangeEvent {
    /// Owner of the affected row.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.record.user_id
    }

    /// Identifier of the affected row.
    #[must_use]
    pub const fn id(&self) -> BookmarkId {
        self.record.id
    }
}

impl TryFrom<ChangePayload> for ChangeEvent {
    type Error = ChangeError;

    fn try_from(payload: ChangePayload) -> Result<Self, Self::Error> {
        let (record, image) = match payload.kind {
            ChangeKind::Insert | ChangeKind::Update => (payload.new, "new"),
            ChangeKind::Delete => (payload.old, "old"),
        };

        let record = record.ok_or(ChangeError::MissingImage {
            kind: payload.kind,
            image,
        })?;

        Ok(Self {
            kind: payload.kind,
            record,
        })
    }
}

/// A change event as delivered to subscribers, stamped by the feed.
///
/// `sequence` is monotonic per server process; a gap means events were lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Position of this event in the feed.
    pub sequence: u64,
    /// The change itself.
    #[serde(flatten)]
    pub change: ChangeEvent,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ROW: &str = r#"{
        "id": "0b6f3c1e-8c9a-4a57-9f0e-3f2d5d1c7a10",
        "user_id": "7d1c2a4e-1111-4a57-9f0e-3f2d5d1c7a10",
        "title": "A",
        "url": "https://a.com",
        "created_at": "2026-01-02T03:04:05.123456+00:00",
        "version": 3
    }"#;

    #[test]
    fn test_insert_takes_new_image() {
        let raw = format!(r#"{{"type":"INSERT","new":{ROW},"old":null}}"#);
        let event = ChangeEvent::try_from(ChangePayload::from_json(&raw).unwrap()).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record.title, "A");
        assert_eq!(event.record.version, 3);
    }

    #[test]
    fn test_delete_takes_old_image() {
        let raw = format!(r#"{{"type":"DELETE","new":null,"old":{ROW}}}"#);
        let event = ChangeEvent::try_from(ChangePayload::from_json(&raw).unwrap()).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(
            event.owner().to_string(),
            "7d1c2a4e-1111-4a57-9f0e-3f2d5d1c7a10"
        );
    }

    #[test]
    fn test_missing_image_is_error() {
        let raw = format!(r#"{{"type":"UPDATE","old":{ROW}}}"#);
        let err = ChangeEvent::try_from(ChangePayload::from_json(&raw).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ChangeError::MissingImage {
                kind: ChangeKind::Update,
                image: "new"
            }
        ));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            ChangePayload::from_json("{\"type\":\"TRUNCATE\"}"),
            Err(ChangeError::Malformed(_))
        ));
    }

    #[test]
    fn test_feed_message_wire_shape() {
        let raw = format!(r#"{{"type":"INSERT","new":{ROW}}}"#);
        let change = ChangeEvent::try_from(ChangePayload::from_json(&raw).unwrap()).unwrap();
        let message = FeedMessage {
            sequence: 7,
            change,
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["sequence"], 7);
        assert_eq!(value["kind"], "insert");
        assert_eq!(value["record"]["url"], "https://a.com");

        let back: FeedMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, message);
    }
}
