//! Core types for Smart Bookmarks.
//!
//! This module provides type-safe wrappers for the bookmark domain.

pub mod bookmark;
pub mod change;
pub mod email;
pub mod id;
pub mod status;

pub use bookmark::{Bookmark, DraftError, NewBookmark};
pub use change::{ChangeError, ChangeEvent, ChangeKind, ChangePayload, FeedMessage};
pub use email::{Email, EmailError};
pub use id::*;
pub use status::SubscriptionStatus;
