//! Integration tests for Smart Bookmarks.
//!
//! These run against a live server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and the server
//! task db:start
//! cargo run -p smart-bookmarks-web
//!
//! # Unauthenticated checks
//! cargo test -p smart-bookmarks-integration-tests -- --ignored
//!
//! # Authenticated checks need a session cookie from a signed-in browser
//! SB_SESSION=... cargo test -p smart-bookmarks-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `BOOKMARKS_BASE_URL` - Server under test (default `http://localhost:3000`)
//! - `SB_SESSION` - Value of the `sb_session` cookie; tests needing it skip when unset

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::{Client, redirect};

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("BOOKMARKS_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Client that keeps cookies and does not follow redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn anonymous_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Client carrying the `SB_SESSION` cookie, or `None` when it is not set.
///
/// # Panics
///
/// Panics if the cookie value is not a valid header or the client cannot be
/// built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn session_client() -> Option<Client> {
    let session = std::env::var("SB_SESSION").ok()?;
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("sb_session={session}")).expect("Invalid session cookie"),
    );

    Some(
        Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client"),
    )
}
