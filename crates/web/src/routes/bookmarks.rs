//! Add and delete actions for the HTML list view.
//!
//! Both follow post/redirect/get: success redirects back to `/` with a
//! notice marker, which reloads the list from the store.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use smart_bookmarks_core::{BookmarkId, NewBookmark};

use crate::db::BookmarkRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::routes::home::{ADD_FAILED, FormValues, HomeTemplate};
use crate::state::AppState;

/// Redirect after a successful delete.
const DELETED_REDIRECT: &str = "/?notice=deleted";
/// Redirect after a failed delete.
const DELETE_FAILED_REDIRECT: &str = "/?error=delete_failed";

/// Add-form fields.
#[derive(Debug, Deserialize)]
pub struct BookmarkForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Handle the add form.
///
/// Validation failures re-render the list with the message and the entered
/// values; nothing is sent to the store.
///
/// # Route
///
/// `POST /bookmarks`
#[instrument(skip_all, fields(owner = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<BookmarkForm>,
) -> Result<Response> {
    let values = FormValues {
        title: form.title.clone(),
        url: form.url.clone(),
    };

    let draft = match NewBookmark::parse(&form.title, &form.url) {
        Ok(draft) => draft,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected add form");
            let page = HomeTemplate::load(&state, &user, None, Some(e.to_string()), values).await?;
            return Ok(page.with_status(StatusCode::UNPROCESSABLE_ENTITY));
        }
    };

    match BookmarkRepository::new(state.pool())
        .create(user.id, &draft)
        .await
    {
        Ok(bookmark) => {
            tracing::info!(bookmark_id = %bookmark.id, "Bookmark added");
            Ok(Redirect::to("/?notice=added").into_response())
        }
        Err(e) => {
            sentry::capture_error(&e);
            tracing::error!(error = %e, "Failed to add bookmark");
            let page =
                HomeTemplate::load(&state, &user, None, Some(ADD_FAILED.to_string()), values)
                    .await?;
            Ok(page.with_status(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

/// Delete a bookmark, then reload the list.
///
/// Deleting an id that is gone or not owned by the user is not an error.
///
/// # Route
///
/// `POST /bookmarks/{id}/delete`
#[instrument(skip_all, fields(owner = %user.id, bookmark_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookmarkId>,
) -> Redirect {
    match BookmarkRepository::new(state.pool())
        .delete(user.id, id)
        .await
    {
        Ok(_) => Redirect::to(DELETED_REDIRECT),
        Err(e) => {
            sentry::capture_error(&e);
            tracing::error!(error = %e, "Failed to delete bookmark");
            Redirect::to(DELETE_FAILED_REDIRECT)
        }
    }
}
