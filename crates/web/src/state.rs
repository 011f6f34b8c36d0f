//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::config::BookmarksConfig;
use crate::feed::ChangeFeed;
use crate::services::identity::IdentityClient;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BookmarksConfig,
    pool: PgPool,
    identity: IdentityClient,
    feed: ChangeFeed,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The change feed starts in `CONNECTING`; call
    /// [`start_change_feed`](Self::start_change_feed) to attach the listener.
    #[must_use]
    pub fn new(config: BookmarksConfig, pool: PgPool) -> Self {
        let identity = IdentityClient::new(&config.identity);
        let feed = ChangeFeed::new(config.feed_capacity);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                feed,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &BookmarksConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Get a reference to the change-feed hub.
    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.inner.feed
    }

    /// Start listening for bookmark changes in the background.
    pub fn start_change_feed(&self) -> JoinHandle<()> {
        self.inner.feed.spawn_listener(self.inner.pool.clone())
    }
}
