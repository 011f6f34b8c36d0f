//! Change-feed reconciliation.
//!
//! A [`Reconciler`] holds the bookmark list a view is showing and folds
//! change events into it. It starts from a snapshot fetched once and then
//! applies events from a best-effort push stream that may duplicate events,
//! deliver them for other owners, or race the snapshot fetch.
//!
//! # Rules
//!
//! - Events for another owner are ignored.
//! - Insert: prepend unless the id is already present or was deleted.
//! - Update: replace in place when the id is present and the event carries a
//!   newer version; never resurrect an untracked row.
//! - Delete: remove if present; always remember the id as a tombstone so a
//!   late insert for it is ignored.
//!
//! Every call reports what happened as an [`Applied`] value, so callers can
//! tie side effects (toasts, animations) to real transitions only.
//!
//! # Example
//!
//! ```
//! use smart_bookmarks_core::{Applied, Bookmark, ChangeEvent, ChangeKind, Reconciler};
//! # use smart_bookmarks_core::{BookmarkId, OwnerId};
//! # let owner = OwnerId::new(uuid::Uuid::new_v4());
//! # let record = Bookmark {
//! #     id: BookmarkId::new(uuid::Uuid::new_v4()),
//! #     user_id: owner,
//! #     title: "A".into(),
//! #     url: "https://a.com".into(),
//! #     created_at: chrono::Utc::now(),
//! #     version: 1,
//! # };
//! let mut view = Reconciler::new(owner, Vec::new());
//! let insert = ChangeEvent { kind: ChangeKind::Insert, record };
//!
//! assert_eq!(view.apply(&insert), Applied::Inserted);
//! assert!(view.apply(&insert).is_ignored());
//! assert_eq!(view.len(), 1);
//! ```

use std::collections::HashSet;

use crate::types::{Bookmark, BookmarkId, ChangeEvent, ChangeKind, OwnerId};

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The record was prepended.
    Inserted,
    /// The tracked record was replaced.
    Updated,
    /// The tracked record was removed.
    Removed,
    /// Nothing changed.
    Ignored(Ignored),
}

impl Applied {
    /// Whether the local list was left untouched.
    #[must_use]
    pub const fn is_ignored(self) -> bool {
        matches!(self, Self::Ignored(_))
    }
}

/// Why an event left the list unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// The record belongs to a different owner.
    ForeignOwner,
    /// Insert for an id that is already present.
    Duplicate,
    /// Insert or update for an id that was already deleted.
    Deleted,
    /// Update for an id that is not tracked.
    Untracked,
    /// Update whose version is not newer than the tracked record.
    Stale,
    /// Delete for an id that is not present.
    Absent,
}

/// Local view state for one owner's bookmarks.
#[derive(Debug, Clone)]
pub struct Reconciler {
    owner: OwnerId,
    records: Vec<Bookmark>,
    tombstones: HashSet<BookmarkId>,
}

impl Reconciler {
    /// Start from an initial snapshot (creation time descending).
    ///
    /// Records in the snapshot that belong to another owner are dropped.
    #[must_use]
    pub fn new(owner: OwnerId, snapshot: Vec<Bookmark>) -> Self {
        let mut reconciler = Self {
            owner,
            records: Vec::new(),
            tombstones: HashSet::new(),
        };
        reconciler.reset(snapshot);
        reconciler
    }

    /// Replace the tracked list with a freshly fetched snapshot.
    ///
    /// Tombstones survive a reset: an id deleted through the feed stays
    /// hidden even if the snapshot was read before the delete committed.
    pub fn reset(&mut self, snapshot: Vec<Bookmark>) {
        let owner = self.owner;
        let dropped_before = snapshot.len();
        self.records = snapshot
            .into_iter()
            .filter(|b| b.is_owned_by(owner) && !self.tombstones.contains(&b.id))
            .collect();

        let dropped = dropped_before - self.records.len();
        if dropped > 0 {
            tracing::debug!(owner = %owner, dropped, "Dropped foreign or deleted rows from snapshot");
        }
    }

    /// Apply one change event.
    pub fn apply(&mut self, event: &ChangeEvent) -> Applied {
        if event.owner() != self.owner {
            tracing::debug!(
                owner = %self.owner,
                event_owner = %event.owner(),
                "Skipping change for different owner"
            );
            return Applied::Ignored(Ignored::ForeignOwner);
        }

        let outcome = match event.kind {
            ChangeKind::Insert => self.insert(&event.record),
            ChangeKind::Update => self.update(&event.record),
            ChangeKind::Delete => self.delete(event.id()),
        };

        tracing::debug!(
            kind = %event.kind,
            bookmark_id = %event.id(),
            outcome = ?outcome,
            "Applied change event"
        );
        outcome
    }

    fn insert(&mut self, record: &Bookmark) -> Applied {
        if self.tombstones.contains(&record.id) {
            return Applied::Ignored(Ignored::Deleted);
        }
        if self.contains(record.id) {
            return Applied::Ignored(Ignored::Duplicate);
        }
        self.records.insert(0, record.clone());
        Applied::Inserted
    }

    fn update(&mut self, record: &Bookmark) -> Applied {
        if self.tombstones.contains(&record.id) {
            return Applied::Ignored(Ignored::Deleted);
        }
        let Some(tracked) = self.records.iter_mut().find(|b| b.id == record.id) else {
            return Applied::Ignored(Ignored::Untracked);
        };
        if record.version <= tracked.version {
            return Applied::Ignored(Ignored::Stale);
        }
        *tracked = record.clone();
        Applied::Updated
    }

    fn delete(&mut self, id: BookmarkId) -> Applied {
        self.tombstones.insert(id);
        let before = self.records.len();
        self.records.retain(|b| b.id != id);
        if self.records.len() < before {
            Applied::Removed
        } else {
            Applied::Ignored(Ignored::Absent)
        }
    }

    /// The tracked bookmarks, newest first.
    #[must_use]
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.records
    }

    /// Consume the reconciler and return the tracked bookmarks.
    #[must_use]
    pub fn into_bookmarks(self) -> Vec<Bookmark> {
        self.records
    }

    /// Owner this view is scoped to.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Whether a record with `id` is tracked.
    #[must_use]
    pub fn contains(&self, id: BookmarkId) -> bool {
        self.records.iter().any(|b| b.id == id)
    }

    /// Number of tracked bookmarks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no bookmarks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
