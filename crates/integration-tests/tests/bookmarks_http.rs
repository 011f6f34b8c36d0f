//! Integration tests for the bookmark HTTP surface.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (`sb-cli migrate`)
//! - The web server running (cargo run -p smart-bookmarks-web)
//! - `SB_SESSION` for the authenticated tests (they skip without it)
//!
//! Run with: cargo test -p smart-bookmarks-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use serde_json::json;
use smart_bookmarks_core::{Bookmark, FeedMessage};

use smart_bookmarks_integration_tests::{anonymous_client, base_url, session_client};

fn unique_title(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix} {nanos}")
}

// ============================================================================
// Unauthenticated
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_health() {
    let resp = anonymous_client()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_home_redirects_to_login() {
    let resp = anonymous_client()
        .get(base_url())
        .send()
        .await
        .expect("Failed to send request");

    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers().get(LOCATION).unwrap(), "/login");
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_login_page_renders() {
    let resp = anonymous_client()
        .get(format!("{}/login", base_url()))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("/auth/login"));
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_api_requires_session() {
    let client = anonymous_client();
    let base = base_url();

    let list = client
        .get(format!("{base}/api/bookmarks"))
        .send()
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::UNAUTHORIZED);

    let events = client
        .get(format!("{base}/api/bookmarks/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_callback_without_code_returns_to_login() {
    let resp = anonymous_client()
        .get(format!("{}/auth/callback", base_url()))
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    let location = resp.headers().get(LOCATION).unwrap().to_str().unwrap();
    assert!(location.starts_with("/login"));
}

// ============================================================================
// Authenticated (SB_SESSION)
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and SB_SESSION"]
async fn test_create_list_delete() {
    let Some(client) = session_client() else {
        return;
    };
    let base = base_url();
    let title = unique_title("Integration");

    let created = client
        .post(format!("{base}/api/bookmarks"))
        .json(&json!({ "title": format!("  {title}  "), "url": "https://example.org/it" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: Bookmark = created.json().await.unwrap();
    assert_eq!(created.title, title);

    let list: Vec<Bookmark> = client
        .get(format!("{base}/api/bookmarks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.first().map(|b| b.id), Some(created.id));
    assert!(list.iter().all(|b| b.user_id == created.user_id));

    let deleted = client
        .delete(format!("{base}/api/bookmarks/{}", created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    // Deleting again is not an error
    let again = client
        .delete(format!("{base}/api/bookmarks/{}", created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running server and SB_SESSION"]
async fn test_create_rejects_invalid_input() {
    let Some(client) = session_client() else {
        return;
    };

    let resp = client
        .post(format!("{}/api/bookmarks", base_url()))
        .json(&json!({ "title": "Broken", "url": "not-a-url" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = resp.text().await.unwrap();
    assert_eq!(body, "Please enter a valid URL");
}

#[tokio::test]
#[ignore = "Requires running server and SB_SESSION"]
async fn test_event_stream_delivers_insert() {
    let Some(client) = session_client() else {
        return;
    };
    let base = base_url();

    let events = client
        .get(format!("{base}/api/bookmarks/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);
    let mut body = events.bytes_stream();

    // Wait for the subscription to be confirmed before writing
    let mut buffer = String::new();
    tokio::time::timeout(Duration::from_secs(10), async {
        while !buffer.contains("SUBSCRIBED") {
            let chunk = body.next().await.unwrap().unwrap();
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .expect("Subscription was not confirmed");
    buffer.clear();

    let title = unique_title("Live");
    let created: Bookmark = client
        .post(format!("{base}/api/bookmarks"))
        .json(&json!({ "title": title, "url": "https://example.org/live" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(data) = buffer
                .split("\n\n")
                .filter(|frame| frame.contains("event: change"))
                .filter_map(|frame| frame.lines().find_map(|l| l.strip_prefix("data: ")))
                .find(|data| data.contains(&created.id.to_string()))
            {
                return serde_json::from_str::<FeedMessage>(data).unwrap();
            }
            let chunk = body.next().await.unwrap().unwrap();
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .expect("Insert event was not delivered");

    assert_eq!(message.change.record.title, title);

    client
        .delete(format!("{base}/api/bookmarks/{}", created.id))
        .send()
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires running server and SB_SESSION"]
async fn test_signout_ends_session() {
    // Signs out the session under test; run last or with a throwaway cookie
    if std::env::var("SB_SIGNOUT_OK").is_err() {
        return;
    }
    let Some(client) = session_client() else {
        return;
    };
    let base = base_url();

    let resp = client
        .post(format!("{base}/auth/signout"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(resp.headers().get(LOCATION).unwrap(), "/login");

    let home = client.get(&base).send().await.unwrap();
    assert!(home.status().is_redirection());
    assert_eq!(home.headers().get(LOCATION).unwrap(), "/login");
}
