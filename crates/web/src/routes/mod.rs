//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - List view (requires auth)
//! POST /bookmarks                 - Add form
//! POST /bookmarks/{id}/delete     - Delete, then reload
//! GET  /test-realtime             - Live-update diagnostics (requires auth)
//!
//! # Auth (rate limited)
//! GET  /login                     - Sign-in page
//! GET  /auth/login                - Redirect to the identity provider
//! GET  /auth/callback             - Code exchange
//! POST /auth/signout              - Sign out
//!
//! # API (requires auth; 401 otherwise)
//! GET    /api/bookmarks           - Snapshot
//! POST   /api/bookmarks           - Create
//! DELETE /api/bookmarks/{id}      - Delete
//! GET    /api/bookmarks/events    - SSE change feed
//! GET    /api/diagnostics/realtime
//! ```

pub mod api;
pub mod auth;
pub mod bookmarks;
pub mod diagnostics;
pub mod home;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::start))
        .route("/callback", get(auth::callback))
        .route("/signout", post(auth::signout))
        .layer(auth_rate_limiter())
}

/// Create the HTML bookmark action routes router.
pub fn bookmark_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(bookmarks::create))
        .route("/{id}/delete", post(bookmarks::delete))
}

/// Create the JSON API routes router.
///
/// The event stream is outside the write limiter so a long-lived
/// connection does not consume quota.
pub fn api_routes() -> Router<AppState> {
    let writes = Router::new()
        .route(
            "/bookmarks",
            get(api::bookmarks::list).post(api::bookmarks::create),
        )
        .route("/bookmarks/{id}", delete(api::bookmarks::delete))
        .layer(api_rate_limiter());

    Router::new()
        .merge(writes)
        .route("/bookmarks/events", get(api::bookmarks::events))
        .route("/diagnostics/realtime", get(diagnostics::realtime))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/login", get(auth::login_page))
        .route("/test-realtime", get(diagnostics::page))
        .nest("/bookmarks", bookmark_routes())
        .nest("/auth", auth_routes())
        .nest("/api", api_routes())
}
