//! List view: the signed-in user's bookmarks and the add form.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use smart_bookmarks_core::Bookmark;

use crate::db::BookmarkRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Longest URL shown in full in the list.
const DISPLAY_URL_LENGTH: usize = 50;

/// Notice shown after a successful add.
pub const ADDED_NOTICE: &str = "Bookmark added successfully";
/// Notice shown after a delete.
pub const DELETED_NOTICE: &str = "Bookmark deleted successfully";
/// Error shown when the create request fails.
pub const ADD_FAILED: &str = "Failed to add bookmark. Please try again.";
/// Error shown when the delete request fails.
pub const DELETE_FAILED: &str = "Failed to delete bookmark. Please try again.";

/// Query markers set by redirects back to the list.
#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// A bookmark as rendered in the list.
#[derive(Debug, Clone)]
pub struct BookmarkView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub display_url: String,
    pub created: String,
    pub version: i64,
}

impl From<&Bookmark> for BookmarkView {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.to_string(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            display_url: truncate_url(&bookmark.url),
            created: bookmark.created_at.format("%b %-d, %Y").to_string(),
            version: bookmark.version,
        }
    }
}

/// Shorten a URL for display, keeping whole characters.
fn truncate_url(url: &str) -> String {
    match url.char_indices().nth(DISPLAY_URL_LENGTH) {
        Some((cut, _)) => format!("{}...", url.get(..cut).unwrap_or(url)),
        None => url.to_owned(),
    }
}

/// Values to put back into the add form after a failed submit.
#[derive(Debug, Default, Clone)]
pub struct FormValues {
    pub title: String,
    pub url: String,
}

/// List view template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user_label: String,
    pub owner_id: String,
    pub bookmarks: Vec<BookmarkView>,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub form: FormValues,
}

impl HomeTemplate {
    /// Load the owner's bookmarks and build the page.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmarks cannot be loaded.
    pub async fn load(
        state: &AppState,
        user: &CurrentUser,
        notice: Option<String>,
        error: Option<String>,
        form: FormValues,
    ) -> Result<Self> {
        let bookmarks = BookmarkRepository::new(state.pool())
            .list_for_owner(user.id)
            .await?;

        Ok(Self {
            user_label: user
                .email
                .as_ref()
                .map_or_else(|| user.id.to_string(), ToString::to_string),
            owner_id: user.id.to_string(),
            bookmarks: bookmarks.iter().map(BookmarkView::from).collect(),
            notice,
            error,
            form,
        })
    }

    /// Render with an explicit status code.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, self).into_response()
    }
}

/// Map a redirect marker to its user-facing message.
pub(crate) fn notice_message(marker: Option<&str>) -> Option<String> {
    match marker? {
        "added" => Some(ADDED_NOTICE.to_string()),
        "deleted" => Some(DELETED_NOTICE.to_string()),
        _ => None,
    }
}

pub(crate) fn error_message(marker: Option<&str>) -> Option<String> {
    match marker? {
        "delete_failed" => Some(DELETE_FAILED.to_string()),
        "add_failed" => Some(ADD_FAILED.to_string()),
        _ => None,
    }
}

/// Display the list view.
///
/// # Route
///
/// `GET /`
#[instrument(skip(state, user, query), fields(owner = %user.id))]
pub async fn home(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<HomeQuery>,
) -> Result<HomeTemplate> {
    HomeTemplate::load(
        &state,
        &user,
        notice_message(query.notice.as_deref()),
        error_message(query.error.as_deref()),
        FormValues::default(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use smart_bookmarks_core::{BookmarkId, OwnerId};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_truncate_url() {
        assert_eq!(truncate_url("https://a.com"), "https://a.com");

        let long = format!("https://example.org/{}", "é".repeat(60));
        let shown = truncate_url(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), DISPLAY_URL_LENGTH + 3);
    }

    #[test]
    fn test_bookmark_view_formats_date() {
        let bookmark = Bookmark {
            id: BookmarkId::new(Uuid::nil()),
            user_id: OwnerId::new(Uuid::nil()),
            title: "Rust".to_string(),
            url: "https://www.rust-lang.org".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).single().unwrap_or_default(),
            version: 1,
        };
        let view = BookmarkView::from(&bookmark);
        assert_eq!(view.created, "Jan 2, 2026");
        assert_eq!(view.display_url, "https://www.rust-lang.org");
    }

    #[test]
    fn test_markers() {
        assert_eq!(notice_message(Some("added")).as_deref(), Some(ADDED_NOTICE));
        assert_eq!(
            notice_message(Some("deleted")).as_deref(),
            Some(DELETED_NOTICE)
        );
        assert_eq!(notice_message(Some("other")), None);
        assert_eq!(
            error_message(Some("delete_failed")).as_deref(),
            Some(DELETE_FAILED)
        );
        assert_eq!(error_message(None), None);
    }
}
