//! Session-scoped models.

pub mod session;

pub use session::{CurrentUser, ProviderToken, keys as session_keys};
