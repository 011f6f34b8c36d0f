//! Bookmark records and add-form validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::id::{BookmarkId, OwnerId};

/// A stored bookmark.
///
/// Field names match the `bookmarks` table columns, which is also the shape of
/// the row images carried by change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Bookmark {
    /// Server-assigned identifier.
    pub id: BookmarkId,
    /// Owner of this bookmark.
    pub user_id: OwnerId,
    /// Free-text title.
    pub title: String,
    /// Target URL (validated on creation).
    pub url: String,
    /// When the bookmark was created.
    pub created_at: DateTime<Utc>,
    /// Row version, bumped by the store on every update.
    #[serde(default = "initial_version")]
    pub version: i64,
}

const fn initial_version() -> i64 {
    1
}

impl Bookmark {
    /// Returns whether this bookmark belongs to `owner`.
    #[must_use]
    pub fn is_owned_by(&self, owner: OwnerId) -> bool {
        self.user_id == owner
    }
}

/// Validation failures for the add-bookmark form.
///
/// The `Display` strings are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// Title or URL is empty.
    #[error("Please fill in all fields")]
    MissingFields,

    /// URL did not parse.
    #[error("Please enter a valid URL")]
    InvalidUrl,

    /// Title or URL contains a control character (tab, newline, NUL, ...).
    #[error("Title and URL cannot contain control characters")]
    ControlCharacters,

    /// Title exceeds [`NewBookmark::MAX_TITLE_LENGTH`].
    #[error("Title must be at most {max} characters")]
    TitleTooLong {
        /// Maximum allowed length.
        max: usize,
    },

    /// URL exceeds [`NewBookmark::MAX_URL_LENGTH`].
    #[error("URL must be at most {max} bytes")]
    UrlTooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A validated create request.
///
/// Only constructible through [`NewBookmark::parse`], so holding one means the
/// form passed validation and no request is issued otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    title: String,
    url: String,
}

impl NewBookmark {
    /// Maximum title length in characters.
    pub const MAX_TITLE_LENGTH: usize = 500;
    /// Maximum URL length in bytes.
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Validate raw form input.
    ///
    /// Both fields are trimmed. Emptiness is checked before URL syntax, so a
    /// form with an empty title and a bad URL reports missing fields.
    ///
    /// Control characters are rejected: the store escapes each one to six
    /// bytes in change notifications, and the length caps only keep a row
    /// image under the 8000-byte notification limit without them.
    ///
    /// # Errors
    ///
    /// Returns a [`DraftError`] describing the first failed check.
    pub fn parse(title: &str, url: &str) -> Result<Self, DraftError> {
        let title = title.trim();
        let url = url.trim();

        if title.is_empty() || url.is_empty() {
            return Err(DraftError::MissingFields);
        }

        if title.chars().chain(url.chars()).any(char::is_control) {
            return Err(DraftError::ControlCharacters);
        }

        if Url::parse(url).is_err() {
            return Err(DraftError::InvalidUrl);
        }

        if title.chars().count() > Self::MAX_TITLE_LENGTH {
            return Err(DraftError::TitleTooLong {
                max: Self::MAX_TITLE_LENGTH,
            });
        }
        if url.len() > Self::MAX_URL_LENGTH {
            return Err(DraftError::UrlTooLong {
                max: Self::MAX_URL_LENGTH,
            });
        }

        Ok(Self {
            title: title.to_owned(),
            url: url.to_owned(),
        })
    }

    /// The trimmed title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The trimmed URL, exactly as entered.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let draft = NewBookmark::parse(" Rust ", " https://www.rust-lang.org ").unwrap();
        assert_eq!(draft.title(), "Rust");
        assert_eq!(draft.url(), "https://www.rust-lang.org");
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(
            NewBookmark::parse("", "https://a.com"),
            Err(DraftError::MissingFields)
        );
        assert_eq!(NewBookmark::parse("A", "   "), Err(DraftError::MissingFields));
        // Emptiness wins over a malformed URL
        assert_eq!(
            NewBookmark::parse("", "not-a-url"),
            Err(DraftError::MissingFields)
        );
    }

    #[test]
    fn test_parse_invalid_url() {
        assert_eq!(
            NewBookmark::parse("A", "not-a-url"),
            Err(DraftError::InvalidUrl)
        );
        assert_eq!(
            NewBookmark::parse("A", "http://"),
            Err(DraftError::InvalidUrl)
        );
    }

    #[test]
    fn test_parse_accepts_non_http_schemes() {
        // Any syntactically valid absolute URL is accepted
        assert!(NewBookmark::parse("Mail", "mailto:reader@example.com").is_ok());
    }

    #[test]
    fn test_parse_too_long() {
        let title = "t".repeat(NewBookmark::MAX_TITLE_LENGTH + 1);
        assert!(matches!(
            NewBookmark::parse(&title, "https://a.com"),
            Err(DraftError::TitleTooLong { .. })
        ));

        let url = format!("https://a.com/{}", "p".repeat(NewBookmark::MAX_URL_LENGTH));
        assert!(matches!(
            NewBookmark::parse("A", &url),
            Err(DraftError::UrlTooLong { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        assert_eq!(
            NewBookmark::parse("A\u{1}B", "https://a.com"),
            Err(DraftError::ControlCharacters)
        );
        assert_eq!(
            NewBookmark::parse("A", &format!("https://a.com/{}", "\u{1}".repeat(2000))),
            Err(DraftError::ControlCharacters)
        );
        assert_eq!(
            NewBookmark::parse("Two\nlines", "https://a.com"),
            Err(DraftError::ControlCharacters)
        );
    }

    #[test]
    fn test_largest_draft_fits_in_one_notification() {
        // Widest encodings that still pass: 4-byte chars in the title and
        // characters that JSON escapes to two bytes in the URL.
        let title = "\u{1F516}".repeat(NewBookmark::MAX_TITLE_LENGTH);
        let prefix = "https://a.com/";
        let url = format!(
            "{prefix}{}",
            "\\".repeat(NewBookmark::MAX_URL_LENGTH - prefix.len())
        );
        let draft = NewBookmark::parse(&title, &url).unwrap();
        assert_eq!(draft.url().len(), NewBookmark::MAX_URL_LENGTH);

        let row = Bookmark {
            id: BookmarkId::new(uuid::Uuid::from_u128(u128::MAX)),
            user_id: OwnerId::new(uuid::Uuid::from_u128(u128::MAX)),
            title: draft.title().to_string(),
            url: draft.url().to_string(),
            created_at: Utc::now(),
            version: i64::MAX,
        };
        let payload = serde_json::json!({ "type": "UPDATE", "new": row, "old": null }).to_string();
        assert!(payload.len() < 8000, "payload is {} bytes", payload.len());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DraftError::MissingFields.to_string(),
            "Please fill in all fields"
        );
        assert_eq!(DraftError::InvalidUrl.to_string(), "Please enter a valid URL");
    }

    #[test]
    fn test_bookmark_version_defaults() {
        let json = r#"{
            "id": "0b6f3c1e-8c9a-4a57-9f0e-3f2d5d1c7a10",
            "user_id": "7d1c2a4e-1111-4a57-9f0e-3f2d5d1c7a10",
            "title": "A",
            "url": "https://a.com",
            "created_at": "2026-01-02T03:04:05.123456+00:00"
        }"#;
        let bookmark: Bookmark = serde_json::from_str(json).unwrap();
        assert_eq!(bookmark.version, 1);
    }
}
