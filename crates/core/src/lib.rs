//! Smart Bookmarks Core - Shared types and reconciliation logic.
//!
//! This crate provides the pieces shared by every Smart Bookmarks component:
//! - `web` - The axum server (list view, add form, change feed)
//! - `cli` - Migrations and the terminal `watch` client
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Both the server and the terminal client depend on
//! it, so the reconciliation rules are written exactly once.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, bookmarks, change events, feed status
//! - [`reconcile`] - Merges an initial snapshot with a live change stream

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod reconcile;
pub mod types;

pub use reconcile::{Applied, Ignored, Reconciler};
pub use types::*;
