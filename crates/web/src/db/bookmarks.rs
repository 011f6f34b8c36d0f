//! Bookmark repository.
//!
//! Every query is scoped to an owner; there is no way to read or delete
//! another user's rows through this type. No update operation exists: rows
//! change only through the store itself.

use sqlx::PgPool;
use tracing::instrument;

use smart_bookmarks_core::{Bookmark, BookmarkId, NewBookmark, OwnerId};

use super::RepositoryError;

/// Repository for bookmark database operations.
pub struct BookmarkRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookmarkRepository<'a> {
    /// Create a new bookmark repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All bookmarks belonging to `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn list_for_owner(&self, owner: OwnerId) -> Result<Vec<Bookmark>, RepositoryError> {
        let rows = sqlx::query_as::<_, Bookmark>(
            r"
            SELECT id, user_id, title, url, created_at, version
            FROM bookmarks
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a validated bookmark for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, draft), fields(owner = %owner))]
    pub async fn create(
        &self,
        owner: OwnerId,
        draft: &NewBookmark,
    ) -> Result<Bookmark, RepositoryError> {
        let row = sqlx::query_as::<_, Bookmark>(
            r"
            INSERT INTO bookmarks (user_id, title, url)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, url, created_at, version
            ",
        )
        .bind(owner)
        .bind(draft.title())
        .bind(draft.url())
        .fetch_one(self.pool)
        .await?;

        tracing::info!(bookmark_id = %row.id, "Bookmark created");
        Ok(row)
    }

    /// Delete one of `owner`'s bookmarks.
    ///
    /// Returns whether a row was removed. Deleting an id that does not exist,
    /// or that belongs to someone else, removes nothing and is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    #[instrument(skip(self), fields(owner = %owner, bookmark_id = %id))]
    pub async fn delete(&self, owner: OwnerId, id: BookmarkId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if !removed {
            tracing::debug!("Delete matched no rows");
        }
        Ok(removed)
    }
}
