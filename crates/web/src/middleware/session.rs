//! Session middleware configuration.
//!
//! Sessions live in `PostgreSQL` via tower-sessions; the cookie only carries
//! a signed session id.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite, time::Duration};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::BookmarksConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sb_session";

/// Session expiry on inactivity (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Derive the 64-byte cookie signing key from the configured secret.
pub(crate) fn signing_key(config: &BookmarksConfig) -> Key {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer backed by the `PostgreSQL` store.
///
/// The `tower_sessions` table is created by `sb-cli migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &BookmarksConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    session_layer(PostgresStore::new(pool.clone()), config)
}

/// Configure the signed `sb_session` cookie over any session store.
#[must_use]
pub fn session_layer<Store: SessionStore>(
    store: Store,
    config: &BookmarksConfig,
) -> SessionManagerLayer<Store, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config))
}
