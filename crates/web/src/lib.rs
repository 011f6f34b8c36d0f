//! Smart Bookmarks web server library.
//!
//! The server renders the signed-in user's bookmark list, accepts adds and
//! deletes, and pushes row changes to open pages over Server-Sent Events.
//! Everything except `main` lives here so router tests can drive the app in
//! process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;
use tower_sessions_sqlx_store::PostgresStore;

use crate::state::AppState;

/// Directory of static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/web/static";

/// Build the application router with every layer except Sentry.
///
/// Sessions are kept in `PostgreSQL`. Sentry layers wrap the returned router
/// in `main`.
pub fn app(state: AppState) -> Router {
    let store = PostgresStore::new(state.pool().clone());
    app_with_store(state, store)
}

/// Build the application router over a specific session store.
pub fn app_with_store<Store: SessionStore + Clone>(state: AppState, store: Store) -> Router {
    let session_layer = middleware::session_layer(store, state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Fails when the database is unreachable or the change feed has failed;
/// the feed never recovers on its own, so a failed feed means the process
/// should be replaced.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.feed().status().is_live() {
        match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
            Ok(_) => StatusCode::OK,
            Err(e) => {
                tracing::warn!(error = %e, "Readiness check: database unreachable");
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    } else {
        tracing::warn!(status = %state.feed().status(), "Readiness check: change feed down");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::header::{COOKIE, LOCATION};
    use smart_bookmarks_core::{OwnerId, SubscriptionStatus};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::cookie::{Cookie, CookieJar};
    use tower_sessions::{MemoryStore, Session};
    use uuid::Uuid;

    use super::*;
    use crate::config::tests::test_config;
    use crate::middleware::session::{SESSION_COOKIE_NAME, signing_key};
    use crate::models::{CurrentUser, session_keys};

    fn test_state() -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/bookmarks_test")
            .unwrap();
        AppState::new(test_config(), pool)
    }

    /// App over a pool that never connects; only routes that stay off the
    /// database may be exercised.
    fn test_app() -> (Router, AppState) {
        let state = test_state();
        (app(state.clone()), state)
    }

    /// Store a signed-in session and return the signed cookie header for it.
    async fn signed_in_cookie(store: &MemoryStore, state: &AppState) -> String {
        let session = Session::new(None, Arc::new(store.clone()), None);
        session
            .insert(
                session_keys::CURRENT_USER,
                CurrentUser {
                    id: OwnerId::new(Uuid::from_u128(1)),
                    email: None,
                },
            )
            .await
            .unwrap();
        session.save().await.unwrap();
        let id = session.id().unwrap();

        let mut jar = CookieJar::new();
        jar.signed_mut(&signing_key(state.config()))
            .add(Cookie::new(SESSION_COOKIE_NAME, id.to_string()));
        let signed = jar.get(SESSION_COOKIE_NAME).unwrap().value().to_string();
        format!("{SESSION_COOKIE_NAME}={signed}")
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = app.oneshot(request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("content-security-policy"));
    }

    #[tokio::test]
    async fn test_list_view_redirects_to_login() {
        let (app, _) = test_app();
        let response = app.oneshot(request("GET", "/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn test_protected_pages_redirect_to_login() {
        for (method, uri) in [
            ("GET", "/test-realtime"),
            ("POST", "/bookmarks/0b6f3c1e-8c9a-4a57-9f0e-3f2d5d1c7a10/delete"),
        ] {
            let (app, _) = test_app();
            let response = app.oneshot(request(method, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_api_requires_session() {
        for (method, uri) in [
            ("GET", "/api/bookmarks"),
            ("GET", "/api/bookmarks/events"),
            ("DELETE", "/api/bookmarks/0b6f3c1e-8c9a-4a57-9f0e-3f2d5d1c7a10"),
            ("GET", "/api/diagnostics/realtime"),
        ] {
            let (app, _) = test_app();
            let response = app.oneshot(request(method, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_callback_without_code_returns_to_login() {
        let (app, _) = test_app();
        let response = app
            .oneshot(request("GET", "/auth/callback"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
    }

    #[tokio::test]
    async fn test_readiness_fails_when_feed_is_down() {
        let (app, state) = test_app();
        state.feed().set_status(SubscriptionStatus::ChannelError);
        let response = app.oneshot(request("GET", "/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_signout_then_list_view_redirects_to_login() {
        let store = MemoryStore::default();
        let state = test_state();
        let app = app_with_store(state.clone(), store.clone());
        let cookie = signed_in_cookie(&store, &state).await;

        let with_cookie = |method: &str, uri: &str| {
            let mut req = request(method, uri);
            req.headers_mut().insert(COOKIE, cookie.parse().unwrap());
            req
        };

        let signed_in = app
            .clone()
            .oneshot(with_cookie("GET", "/api/diagnostics/realtime"))
            .await
            .unwrap();
        assert_eq!(signed_in.status(), StatusCode::OK);

        let signout = app
            .clone()
            .oneshot(with_cookie("POST", "/auth/signout"))
            .await
            .unwrap();
        assert_eq!(signout.status(), StatusCode::SEE_OTHER);
        assert_eq!(signout.headers().get(LOCATION).unwrap(), "/login");

        let after = app.oneshot(with_cookie("GET", "/")).await.unwrap();
        assert_eq!(after.status(), StatusCode::SEE_OTHER);
        assert_eq!(after.headers().get(LOCATION).unwrap(), "/login");
    }
}
